//! Process-wide session registry.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use concord_domain::game::{GameStatus, PhaseKind, Season};

use crate::session::GameSession;

/// Listing row for the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub game_id: String,
    pub name: String,
    pub status: GameStatus,
    pub year: u16,
    pub season: Season,
    pub phase: PhaseKind,
}

/// Registry of every session hosted by this process. Sessions are cheap
/// `Arc` handles; removal drops the registry's reference, not necessarily
/// the session.
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, GameSession>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: GameSession) {
        self.sessions
            .write()
            .insert(session.game_id().to_string(), session);
    }

    pub fn get(&self, game_id: &str) -> Option<GameSession> {
        self.sessions.read().get(game_id).cloned()
    }

    pub fn remove(&self, game_id: &str) -> Option<GameSession> {
        self.sessions.write().remove(game_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .values()
            .map(|session| {
                let state = session.game_state();
                SessionSummary {
                    game_id: session.game_id().to_string(),
                    name: session.name().to_string(),
                    status: session.status(),
                    year: state.year,
                    season: state.season,
                    phase: state.phase,
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.game_id.cmp(&b.game_id));
        summaries
    }
}
