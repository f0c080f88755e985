//! Webhook administration endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use uuid::Uuid;

use super::{api_error, domain_error};
use crate::state::AppState;

#[derive(Deserialize)]
pub(crate) struct RegisterRequest {
    url: String,
    secret: String,
    event_types: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Registration listing/response shape with the secret redacted.
fn redacted(registration: &concord_webhooks::WebhookRegistration) -> serde_json::Value {
    serde_json::json!({
        "id": registration.id,
        "url": registration.url,
        "event_types": registration.event_types,
        "active": registration.active,
        "created_at": registration.created_at,
        "description": registration.description,
    })
}

pub(crate) async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    match state.webhooks.register(
        request.url,
        request.secret,
        &request.event_types,
        request.description,
    ) {
        Ok(registration) => {
            (StatusCode::CREATED, Json(redacted(&registration))).into_response()
        }
        Err(err) => domain_error(err),
    }
}

pub(crate) async fn list(State(state): State<AppState>) -> impl IntoResponse {
    let registrations: Vec<_> = state.webhooks.list().iter().map(redacted).collect();
    Json(registrations)
}

pub(crate) async fn unregister(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    if state.webhooks.unregister(id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        api_error(StatusCode::NOT_FOUND, format!("no webhook {id}"))
    }
}

pub(crate) async fn activate(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    if state.webhooks.activate(id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        api_error(StatusCode::NOT_FOUND, format!("no webhook {id}"))
    }
}

pub(crate) async fn deactivate(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    if state.webhooks.deactivate(id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        api_error(StatusCode::NOT_FOUND, format!("no webhook {id}"))
    }
}

pub(crate) async fn dead_letters(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.webhooks.get_dead_letters())
}

pub(crate) async fn clear_dead_letters(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.webhooks.clear_dead_letters();
    Json(serde_json::json!({ "cleared": cleared }))
}

pub(crate) async fn retry_dead_letter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Response {
    if state.webhooks.retry_dead_letter(id) {
        StatusCode::ACCEPTED.into_response()
    } else {
        api_error(
            StatusCode::NOT_FOUND,
            format!("no dead letter {id} (or its registration is gone)"),
        )
    }
}
