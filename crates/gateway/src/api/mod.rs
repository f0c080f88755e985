//! JSON API surface.

mod games;
mod webhooks;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;

use concord_domain::error::Error;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        // ── Games ─────────────────────────────────────────────────
        .route("/v1/games", post(games::create).get(games::list))
        .route("/v1/games/:id", get(games::show))
        .route("/v1/games/:id/start", post(games::start))
        .route("/v1/games/:id/pause", post(games::pause))
        .route("/v1/games/:id/resume", post(games::resume))
        .route("/v1/games/:id/abandon", post(games::abandon))
        .route("/v1/games/:id/orders", post(games::submit_orders))
        .route("/v1/games/:id/resolve", post(games::resolve))
        .route("/v1/games/:id/force-deadline", post(games::force_deadline))
        .route("/v1/games/:id/messages", post(games::send_message))
        .route("/v1/games/:id/events", get(games::events))
        .route("/v1/games/:id/snapshot", get(games::snapshot))
        // ── Webhooks ──────────────────────────────────────────────
        .route("/v1/webhooks", post(webhooks::register).get(webhooks::list))
        .route("/v1/webhooks/dead-letters", get(webhooks::dead_letters).delete(webhooks::clear_dead_letters))
        .route("/v1/webhooks/dead-letters/:id/retry", post(webhooks::retry_dead_letter))
        .route("/v1/webhooks/:id", delete(webhooks::unregister))
        .route("/v1/webhooks/:id/activate", post(webhooks::activate))
        .route("/v1/webhooks/:id/deactivate", post(webhooks::deactivate))
        // ── Stats ─────────────────────────────────────────────────
        .route("/v1/stats", get(stats))
        .with_state(state)
}

/// `{ "error": "<message>" }` with an appropriate status.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Map a domain error onto an HTTP response.
pub(crate) fn domain_error(err: Error) -> Response {
    let status = match &err {
        Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::AuthenticationFailure(_) => StatusCode::UNAUTHORIZED,
        Error::Transient(_) | Error::Timeout(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, err.to_string())
}

async fn stats(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "games": state.sessions.len(),
        "webhooks": state.webhooks.stats(),
        "llm_retry": state.llm_metrics.snapshot(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (Error::InvalidState("x".into()), StatusCode::CONFLICT),
            (Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                Error::AuthenticationFailure("x".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (Error::Transient("x".into()), StatusCode::BAD_GATEWAY),
            (Error::Engine("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(domain_error(err).status(), expected);
        }
    }
}
