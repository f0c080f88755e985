//! Game endpoints: lifecycle, orders, press, history, snapshots.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use concord_domain::config::{OrchestratorConfig, OrchestratorConfigPatch};
use concord_domain::game::Power;
use concord_domain::order::{BuildOrder, MovementOrder, RetreatOrder};
use concord_sessions::GameSession;

use super::{api_error, domain_error};
use crate::adapter;
use crate::state::AppState;

fn lookup(state: &AppState, id: &str) -> Result<GameSession, Response> {
    state
        .sessions
        .get(id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("no game '{id}'")))
}

// ── Creation & lifecycle ───────────────────────────────────────────

#[derive(Deserialize, Default)]
pub(crate) struct CreateGameRequest {
    #[serde(default)]
    name: Option<String>,
    /// Per-game overrides of the configured orchestrator defaults.
    #[serde(default)]
    orchestrator: Option<OrchestratorConfigPatch>,
}

pub(crate) async fn create(
    State(state): State<AppState>,
    body: Option<Json<CreateGameRequest>>,
) -> Response {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let mut config: OrchestratorConfig = state.config.orchestrator.clone();
    if let Some(patch) = &request.orchestrator {
        config.apply(patch);
    }

    let name = request.name.unwrap_or_else(|| "unnamed match".into());
    let session = match GameSession::create(name, state.engine.clone(), config) {
        Ok(session) => session,
        Err(err) => return domain_error(err),
    };

    // Forward future events; creation itself predates the subscription.
    adapter::attach(&session, state.webhooks.clone());
    state.webhooks.dispatch(
        concord_domain::event::WebhookEventType::GameCreated,
        serde_json::json!({ "game_id": session.game_id(), "name": session.name() }),
    );

    state.sessions.insert(session.clone());
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "game_id": session.game_id(),
            "name": session.name(),
            "status": session.status(),
        })),
    )
        .into_response()
}

pub(crate) async fn list(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.sessions.list())
}

pub(crate) async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let session = match lookup(&state, &id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    let game_state = session.game_state();
    Json(serde_json::json!({
        "game_id": session.game_id(),
        "name": session.name(),
        "status": session.status(),
        "year": game_state.year,
        "season": game_state.season,
        "phase": game_state.phase,
        "phase_status": session.phase_status(),
        "agents": session.orchestrator().agents(),
    }))
    .into_response()
}

macro_rules! lifecycle_endpoint {
    ($name:ident, |$session:ident, $body:ident| $call:expr) => {
        pub(crate) async fn $name(
            State(state): State<AppState>,
            Path(id): Path<String>,
            $body: Option<Json<serde_json::Value>>,
        ) -> Response {
            let $session = match lookup(&state, &id) {
                Ok(session) => session,
                Err(response) => return response,
            };
            match $call {
                Ok(()) => Json(serde_json::json!({ "status": $session.status() })).into_response(),
                Err(err) => domain_error(err),
            }
        }
    };
}

lifecycle_endpoint!(start, |session, _body| session.start());
lifecycle_endpoint!(resume, |session, _body| session.resume());
lifecycle_endpoint!(force_deadline, |session, _body| session.force_deadline());
lifecycle_endpoint!(pause, |session, body| {
    let reason = body
        .as_ref()
        .and_then(|json| json.0.get("reason"))
        .and_then(|r| r.as_str())
        .map(String::from);
    session.pause(reason)
});
lifecycle_endpoint!(abandon, |session, body| {
    let reason = body
        .as_ref()
        .and_then(|json| json.0.get("reason"))
        .and_then(|r| r.as_str())
        .unwrap_or("abandoned by operator")
        .to_string();
    session.abandon(reason)
});

// ── Orders ─────────────────────────────────────────────────────────

/// One request shape per phase family, tagged by `phase`.
#[derive(Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub(crate) enum OrdersRequest {
    Movement {
        power: Power,
        orders: Vec<MovementOrder>,
    },
    Retreat {
        power: Power,
        orders: Vec<RetreatOrder>,
    },
    Build {
        power: Power,
        orders: Vec<BuildOrder>,
    },
}

pub(crate) async fn submit_orders(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<OrdersRequest>,
) -> Response {
    let session = match lookup(&state, &id) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let result = match &request {
        OrdersRequest::Movement { power, orders } => {
            session.submit_movement_orders(*power, orders)
        }
        OrdersRequest::Retreat { power, orders } => session.submit_retreat_orders(*power, orders),
        OrdersRequest::Build { power, orders } => session.submit_build_orders(*power, orders),
    };
    match result {
        Ok(()) => Json(serde_json::json!({ "phase_status": session.phase_status() }))
            .into_response(),
        Err(err) => domain_error(err),
    }
}

pub(crate) async fn resolve(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let session = match lookup(&state, &id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match session.resolve_phase() {
        Ok(summary) => Json(serde_json::json!({
            "summary": summary,
            "status": session.status(),
        }))
        .into_response(),
        Err(err) => domain_error(err),
    }
}

// ── Press ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct MessageRequest {
    sender: Power,
    channel_id: String,
    body: String,
}

pub(crate) async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Response {
    let session = match lookup(&state, &id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match session.send_message(request.sender, request.channel_id, &request.body) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => domain_error(err),
    }
}

// ── History & snapshots ────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub(crate) struct EventsQuery {
    #[serde(default)]
    offset: usize,
    limit: Option<usize>,
}

pub(crate) async fn events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let session = match lookup(&state, &id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    let history = session.event_history();
    let total = history.len();
    let events: Vec<_> = history
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();
    Json(serde_json::json!({ "total": total, "events": events })).into_response()
}

pub(crate) async fn snapshot(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match lookup(&state, &id) {
        Ok(session) => Json(session.snapshot()).into_response(),
        Err(response) => response,
    }
}
