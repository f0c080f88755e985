//! Self-contained session snapshots.
//!
//! A snapshot is pure data — JSON-encodable, carrying no secrets and no
//! live timers. Restoration rebuilds an equivalent session; an active one
//! must be re-armed explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use concord_domain::config::OrchestratorConfig;
use concord_domain::event::GameEvent;
use concord_domain::game::{GameState, GameStatus};
use concord_orchestrator::{AgentHandle, PhaseStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSessionSnapshot {
    pub game_id: String,
    pub name: String,
    pub status: GameStatus,
    pub game_state: GameState,
    /// Present iff the session was mid-phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_status: Option<PhaseStatus>,
    pub agents: Vec<AgentHandle>,
    pub event_history: Vec<GameEvent>,
    pub config: OrchestratorConfig,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
