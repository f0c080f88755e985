//! The bus-level event taxonomy and the closed webhook event-type set.
//!
//! Every state change in a session produces exactly one `GameEvent`.
//! Consumers branch on the tagged `kind`; the webhook adapter flattens a
//! curated subset onto the wire.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::game::{PhaseKind, Power, ResolutionSummary, Season};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bus events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Envelope carried by every event: which game, when, and what happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub game_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: GameEventKind,
}

impl GameEvent {
    pub fn now(game_id: impl Into<String>, kind: GameEventKind) -> Self {
        Self {
            game_id: game_id.into(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// What action a timed-out power received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutAction {
    AutoHold,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameEventKind {
    GameCreated,
    GameStarted {
        year: u16,
        season: Season,
        phase: PhaseKind,
    },
    GamePaused {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    GameResumed,
    GameCompleted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner: Option<Power>,
        is_draw: bool,
        final_year: u16,
    },
    GameAbandoned {
        reason: String,
    },
    PhaseStarted {
        year: u16,
        season: Season,
        phase: PhaseKind,
        deadline: DateTime<Utc>,
        active_powers: Vec<Power>,
    },
    PhaseEndingSoon {
        year: u16,
        season: Season,
        phase: PhaseKind,
        deadline: DateTime<Utc>,
        time_remaining_ms: u64,
        pending_powers: Vec<Power>,
    },
    PhaseEnded {
        year: u16,
        season: Season,
        phase: PhaseKind,
        timeout_powers: Vec<Power>,
    },
    OrdersSubmitted {
        power: Power,
        order_count: usize,
    },
    AllOrdersReceived {
        year: u16,
        season: Season,
        phase: PhaseKind,
    },
    OrdersResolved {
        year: u16,
        season: Season,
        phase: PhaseKind,
        summary: ResolutionSummary,
    },
    AgentNudged {
        power: Power,
        deadline: DateTime<Utc>,
        time_remaining_ms: u64,
    },
    AgentTimeout {
        power: Power,
        phase: PhaseKind,
        action: TimeoutAction,
    },
    AgentInactive {
        power: Power,
        missed_deadlines: u32,
    },
    MessageSent {
        sender: Power,
        channel_id: String,
        preview: String,
    },
    Error {
        kind: String,
        message: String,
    },
}

impl GameEventKind {
    /// The stable type tag, matching the serde representation.
    pub fn kind_name(&self) -> &'static str {
        match self {
            GameEventKind::GameCreated => "GAME_CREATED",
            GameEventKind::GameStarted { .. } => "GAME_STARTED",
            GameEventKind::GamePaused { .. } => "GAME_PAUSED",
            GameEventKind::GameResumed => "GAME_RESUMED",
            GameEventKind::GameCompleted { .. } => "GAME_COMPLETED",
            GameEventKind::GameAbandoned { .. } => "GAME_ABANDONED",
            GameEventKind::PhaseStarted { .. } => "PHASE_STARTED",
            GameEventKind::PhaseEndingSoon { .. } => "PHASE_ENDING_SOON",
            GameEventKind::PhaseEnded { .. } => "PHASE_ENDED",
            GameEventKind::OrdersSubmitted { .. } => "ORDERS_SUBMITTED",
            GameEventKind::AllOrdersReceived { .. } => "ALL_ORDERS_RECEIVED",
            GameEventKind::OrdersResolved { .. } => "ORDERS_RESOLVED",
            GameEventKind::AgentNudged { .. } => "AGENT_NUDGED",
            GameEventKind::AgentTimeout { .. } => "AGENT_TIMEOUT",
            GameEventKind::AgentInactive { .. } => "AGENT_INACTIVE",
            GameEventKind::MessageSent { .. } => "MESSAGE_SENT",
            GameEventKind::Error { .. } => "ERROR",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Webhook event types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The closed set of event types deliverable to webhook subscribers.
/// Registration rejects anything outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WebhookEventType {
    #[serde(rename = "game.created")]
    GameCreated,
    #[serde(rename = "game.started")]
    GameStarted,
    #[serde(rename = "game.ended")]
    GameEnded,
    #[serde(rename = "phase.started")]
    PhaseStarted,
    #[serde(rename = "phase.resolved")]
    PhaseResolved,
    #[serde(rename = "orders.submitted")]
    OrdersSubmitted,
    #[serde(rename = "message.sent")]
    MessageSent,
}

impl WebhookEventType {
    pub const ALL: [WebhookEventType; 7] = [
        WebhookEventType::GameCreated,
        WebhookEventType::GameStarted,
        WebhookEventType::GameEnded,
        WebhookEventType::PhaseStarted,
        WebhookEventType::PhaseResolved,
        WebhookEventType::OrdersSubmitted,
        WebhookEventType::MessageSent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventType::GameCreated => "game.created",
            WebhookEventType::GameStarted => "game.started",
            WebhookEventType::GameEnded => "game.ended",
            WebhookEventType::PhaseStarted => "phase.started",
            WebhookEventType::PhaseResolved => "phase.resolved",
            WebhookEventType::OrdersSubmitted => "orders.submitted",
            WebhookEventType::MessageSent => "message.sent",
        }
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WebhookEventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown webhook event type '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_json_is_tagged_and_flattened() {
        let event = GameEvent::now(
            "g1",
            GameEventKind::OrdersSubmitted {
                power: Power::France,
                order_count: 3,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ORDERS_SUBMITTED");
        assert_eq!(json["game_id"], "g1");
        assert_eq!(json["power"], "FRANCE");
        assert_eq!(json["order_count"], 3);
    }

    #[test]
    fn kind_name_matches_serde_tag() {
        let kinds = [
            GameEventKind::GameCreated,
            GameEventKind::GameResumed,
            GameEventKind::AgentTimeout {
                power: Power::Italy,
                phase: PhaseKind::Movement,
                action: TimeoutAction::AutoHold,
            },
        ];
        for kind in kinds {
            let json = serde_json::to_value(&kind).unwrap();
            assert_eq!(json["type"], kind.kind_name());
        }
    }

    #[test]
    fn webhook_event_type_round_trips() {
        for t in WebhookEventType::ALL {
            assert_eq!(t.as_str().parse::<WebhookEventType>().unwrap(), t);
        }
        assert!("game.deleted".parse::<WebhookEventType>().is_err());
    }

    #[test]
    fn webhook_event_type_serde_uses_dotted_names() {
        let json = serde_json::to_string(&WebhookEventType::PhaseResolved).unwrap();
        assert_eq!(json, "\"phase.resolved\"");
    }
}
