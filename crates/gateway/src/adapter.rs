//! Bus → webhook bridge.
//!
//! Subscribes to a session's event bus and forwards the curated subset to
//! the webhook manager with the documented flattened payload shapes.
//! Everything else (nudges, timeouts, pauses) stays in-process.

use std::sync::Arc;

use concord_domain::event::{GameEvent, GameEventKind, WebhookEventType};
use concord_orchestrator::Subscription;
use concord_sessions::GameSession;
use concord_webhooks::WebhookManager;

/// Start forwarding a session's events. The subscription lives as long as
/// the session's bus; the caller may drop the returned handle.
///
/// Attach before `start()` — events emitted earlier (GAME_CREATED happens
/// inside `create`) are not replayed; the create endpoint dispatches
/// `game.created` itself.
pub fn attach(session: &GameSession, webhooks: Arc<WebhookManager>) -> Subscription {
    let name = session.name().to_string();
    session.on_event(move |event| {
        if let Some((event_type, data)) = map_event(event, &name) {
            webhooks.dispatch(event_type, data);
        }
    })
}

/// Map a bus event onto its webhook representation, or `None` for events
/// that do not leave the process.
pub fn map_event(
    event: &GameEvent,
    game_name: &str,
) -> Option<(WebhookEventType, serde_json::Value)> {
    let game_id = &event.game_id;
    match &event.kind {
        GameEventKind::GameCreated => Some((
            WebhookEventType::GameCreated,
            serde_json::json!({ "game_id": game_id, "name": game_name }),
        )),
        GameEventKind::GameStarted { year, season, phase } => Some((
            WebhookEventType::GameStarted,
            serde_json::json!({
                "game_id": game_id,
                "year": year,
                "season": season,
                "phase": phase,
            }),
        )),
        GameEventKind::GameCompleted { winner, is_draw, .. } => Some((
            WebhookEventType::GameEnded,
            serde_json::json!({
                "game_id": game_id,
                "winner": winner,
                "draw": is_draw,
            }),
        )),
        GameEventKind::GameAbandoned { .. } => Some((
            WebhookEventType::GameEnded,
            serde_json::json!({
                "game_id": game_id,
                "winner": serde_json::Value::Null,
                "draw": false,
            }),
        )),
        GameEventKind::PhaseStarted {
            year,
            season,
            phase,
            ..
        } => Some((
            WebhookEventType::PhaseStarted,
            serde_json::json!({
                "game_id": game_id,
                "year": year,
                "season": season,
                "phase": phase,
            }),
        )),
        GameEventKind::OrdersResolved {
            year,
            season,
            phase,
            ..
        } => Some((
            WebhookEventType::PhaseResolved,
            serde_json::json!({
                "game_id": game_id,
                "year": year,
                "season": season,
                "phase": phase,
            }),
        )),
        GameEventKind::OrdersSubmitted { power, order_count } => Some((
            WebhookEventType::OrdersSubmitted,
            serde_json::json!({
                "game_id": game_id,
                "power": power,
                "order_count": order_count,
            }),
        )),
        GameEventKind::MessageSent {
            sender,
            channel_id,
            preview,
        } => Some((
            WebhookEventType::MessageSent,
            serde_json::json!({
                "game_id": game_id,
                "sender": sender,
                "channel_id": channel_id,
                "preview": preview,
            }),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_domain::game::{PhaseKind, Power, Season};

    fn event(kind: GameEventKind) -> GameEvent {
        GameEvent::now("g-42", kind)
    }

    #[test]
    fn curated_events_are_mapped_with_flattened_data() {
        let (event_type, data) = map_event(
            &event(GameEventKind::GameStarted {
                year: 1901,
                season: Season::Spring,
                phase: PhaseKind::Diplomacy,
            }),
            "my match",
        )
        .unwrap();
        assert_eq!(event_type, WebhookEventType::GameStarted);
        assert_eq!(data["game_id"], "g-42");
        assert_eq!(data["season"], "SPRING");
        assert_eq!(data["phase"], "DIPLOMACY");

        let (event_type, data) = map_event(
            &event(GameEventKind::OrdersSubmitted {
                power: Power::Turkey,
                order_count: 3,
            }),
            "my match",
        )
        .unwrap();
        assert_eq!(event_type, WebhookEventType::OrdersSubmitted);
        assert_eq!(data["power"], "TURKEY");
        assert_eq!(data["order_count"], 3);
    }

    #[test]
    fn game_created_carries_the_name() {
        let (event_type, data) = map_event(&event(GameEventKind::GameCreated), "spring league").unwrap();
        assert_eq!(event_type, WebhookEventType::GameCreated);
        assert_eq!(data["name"], "spring league");
    }

    #[test]
    fn completion_and_abandonment_both_map_to_game_ended() {
        let (event_type, data) = map_event(
            &event(GameEventKind::GameCompleted {
                winner: Some(Power::France),
                is_draw: false,
                final_year: 1907,
            }),
            "m",
        )
        .unwrap();
        assert_eq!(event_type, WebhookEventType::GameEnded);
        assert_eq!(data["winner"], "FRANCE");
        assert_eq!(data["draw"], false);

        let (event_type, data) = map_event(
            &event(GameEventKind::GameAbandoned {
                reason: "stalled".into(),
            }),
            "m",
        )
        .unwrap();
        assert_eq!(event_type, WebhookEventType::GameEnded);
        assert!(data["winner"].is_null());
    }

    #[test]
    fn internal_events_stay_internal() {
        for kind in [
            GameEventKind::GameResumed,
            GameEventKind::GamePaused { reason: None },
            GameEventKind::AgentNudged {
                power: Power::Italy,
                deadline: chrono::Utc::now(),
                time_remaining_ms: 1000,
            },
            GameEventKind::Error {
                kind: "engine_failure".into(),
                message: "x".into(),
            },
        ] {
            assert!(map_event(&event(kind), "m").is_none());
        }
    }
}
