//! End-to-end delivery tests against a loopback HTTP receiver: signing,
//! retry/backoff, the dead-letter queue, and flush semantics.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;

use concord_domain::config::WebhookDeliveryConfig;
use concord_webhooks::{verify_signature, WebhookManager};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Loopback receiver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
struct Received {
    signature: String,
    event: String,
    payload_id: String,
    timestamp: String,
    content_type: String,
    body: Vec<u8>,
}

#[derive(Clone)]
struct ReceiverState {
    /// Status codes to answer with, in order; the last one repeats.
    script: Arc<Mutex<VecDeque<u16>>>,
    requests: Arc<Mutex<Vec<Received>>>,
    delay_ms: Arc<AtomicU64>,
}

struct Receiver {
    addr: SocketAddr,
    state: ReceiverState,
}

impl Receiver {
    async fn start(script: &[u16]) -> Self {
        let state = ReceiverState {
            script: Arc::new(Mutex::new(script.iter().copied().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay_ms: Arc::new(AtomicU64::new(0)),
        };

        let app = Router::new()
            .route("/hook", post(handle))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    fn url(&self) -> String {
        format!("http://{}/hook", self.addr)
    }

    fn set_script(&self, script: &[u16]) {
        *self.state.script.lock() = script.iter().copied().collect();
    }

    fn requests(&self) -> Vec<Received> {
        self.state.requests.lock().clone()
    }
}

async fn handle(
    State(state): State<ReceiverState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let delay = state.delay_ms.load(Ordering::Relaxed);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    state.requests.lock().push(Received {
        signature: header("x-webhook-signature"),
        event: header("x-webhook-event"),
        payload_id: header("x-webhook-id"),
        timestamp: header("x-webhook-timestamp"),
        content_type: header("content-type"),
        body: body.to_vec(),
    });

    let status = {
        let mut script = state.script.lock();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().copied().unwrap_or(200)
        }
    };
    StatusCode::from_u16(status).unwrap()
}

fn fast_config() -> WebhookDeliveryConfig {
    WebhookDeliveryConfig {
        max_retries: 3,
        base_delay_ms: 1,
        delivery_timeout_ms: 2_000,
    }
}

fn game_created_data() -> serde_json::Value {
    serde_json::json!({ "game_id": "g-123", "name": "test match" })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Signing & headers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn delivery_is_signed_over_exact_body_bytes() {
    let receiver = Receiver::start(&[200]).await;
    let manager = WebhookManager::new(fast_config());
    manager
        .register(receiver.url(), "hmac-secret", &["game.created".into()], None)
        .unwrap();

    let payload = manager.dispatch("game.created".parse().unwrap(), game_created_data());
    manager.flush().await;

    let requests = receiver.requests();
    assert_eq!(requests.len(), 1);
    let received = &requests[0];

    assert!(verify_signature("hmac-secret", &received.body, &received.signature));
    assert!(received.signature.starts_with("sha256="));
    assert_eq!(received.event, "game.created");
    assert_eq!(received.payload_id, payload.id.to_string());
    assert_eq!(received.timestamp, payload.timestamp.to_rfc3339());
    assert_eq!(received.content_type, "application/json");

    // The body is the payload envelope itself.
    let body: serde_json::Value = serde_json::from_slice(&received.body).unwrap();
    assert_eq!(body["event"], "game.created");
    assert_eq!(body["data"]["game_id"], "g-123");

    let log = manager.delivery_log();
    assert_eq!(log.len(), 1);
    assert!(log[0].delivered);
    assert_eq!(log[0].attempts.len(), 1);
    assert_eq!(log[0].attempts[0].attempt_number, 1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Retry & dead letters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn transient_500_is_retried_to_success() {
    let receiver = Receiver::start(&[500, 200]).await;
    let manager = WebhookManager::new(fast_config());
    manager
        .register(receiver.url(), "s", &["game.created".into()], None)
        .unwrap();

    manager.dispatch("game.created".parse().unwrap(), game_created_data());
    manager.flush().await;

    let log = manager.delivery_log();
    assert_eq!(log.len(), 1);
    let record = &log[0];
    assert!(record.delivered);
    assert_eq!(record.attempts.len(), 2);
    assert_eq!(record.attempts[0].status_code, Some(500));
    assert!(!record.attempts[0].success);
    assert_eq!(record.attempts[1].status_code, Some(200));
    assert!(record.attempts[1].success);

    assert!(manager.get_dead_letters().is_empty());
    let stats = manager.stats();
    assert_eq!(stats.successful_deliveries, 1);
    assert_eq!(stats.failed_deliveries, 0);
}

#[tokio::test]
async fn exhausted_delivery_is_dead_lettered_then_retryable() {
    let receiver = Receiver::start(&[500]).await;
    let manager = WebhookManager::new(fast_config());
    let registration = manager
        .register(receiver.url(), "s", &["game.created".into()], None)
        .unwrap();

    let payload = manager.dispatch("game.created".parse().unwrap(), game_created_data());
    manager.flush().await;

    let log = manager.delivery_log();
    assert_eq!(log.len(), 1);
    assert!(!log[0].delivered);
    assert_eq!(log[0].attempts.len(), 3);

    let dead = manager.get_dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].webhook_id, registration.id);
    assert_eq!(dead[0].payload.id, payload.id);
    assert!(dead[0].reason.contains("500"), "reason: {}", dead[0].reason);

    // Endpoint recovers; the operator retries the dead letter.
    receiver.set_script(&[200]);
    assert!(manager.retry_dead_letter(dead[0].id));
    manager.flush().await;

    assert!(manager.get_dead_letters().is_empty());
    let log = manager.delivery_log();
    assert_eq!(log.len(), 2);
    let redelivery = &log[1];
    assert!(redelivery.delivered);
    assert_eq!(redelivery.payload_id, payload.id);

    // The retried entry is gone; a second retry reports false.
    assert!(!manager.retry_dead_letter(dead[0].id));
}

#[tokio::test]
async fn connection_refused_records_errors_and_dead_letters() {
    let manager = WebhookManager::new(WebhookDeliveryConfig {
        max_retries: 2,
        ..fast_config()
    });
    // Nothing listens on port 9: every attempt fails at connect time.
    manager
        .register("http://127.0.0.1:9/hook", "s", &["game.ended".into()], None)
        .unwrap();

    manager.dispatch(
        "game.ended".parse().unwrap(),
        serde_json::json!({ "game_id": "g-123", "winner": "FRANCE" }),
    );
    manager.flush().await;

    let log = manager.delivery_log();
    assert_eq!(log.len(), 1);
    assert!(!log[0].delivered);
    assert_eq!(log[0].attempts.len(), 2);
    for attempt in &log[0].attempts {
        assert_eq!(attempt.status_code, None);
        assert!(attempt.error.is_some());
    }
    assert_eq!(manager.get_dead_letters().len(), 1);
}

#[tokio::test]
async fn slow_endpoint_hits_per_attempt_timeout() {
    let receiver = Receiver::start(&[200]).await;
    receiver.state.delay_ms.store(500, Ordering::Relaxed);

    let manager = WebhookManager::new(WebhookDeliveryConfig {
        max_retries: 1,
        base_delay_ms: 1,
        delivery_timeout_ms: 50,
    });
    manager
        .register(receiver.url(), "s", &["game.created".into()], None)
        .unwrap();

    manager.dispatch("game.created".parse().unwrap(), game_created_data());
    manager.flush().await;

    let log = manager.delivery_log();
    assert_eq!(log.len(), 1);
    assert!(!log[0].delivered);
    let error = log[0].attempts[0].error.as_deref().unwrap();
    assert!(error.contains("timed out"), "error: {error}");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Routing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn dispatch_targets_matching_active_registrations_only() {
    let created_rx = Receiver::start(&[200]).await;
    let ended_rx = Receiver::start(&[200]).await;
    let disabled_rx = Receiver::start(&[200]).await;

    let manager = WebhookManager::new(fast_config());
    manager
        .register(created_rx.url(), "a", &["game.created".into()], None)
        .unwrap();
    manager
        .register(ended_rx.url(), "b", &["game.ended".into()], None)
        .unwrap();
    let disabled = manager
        .register(disabled_rx.url(), "c", &["game.created".into()], None)
        .unwrap();
    manager.deactivate(disabled.id);

    manager.dispatch("game.created".parse().unwrap(), game_created_data());
    manager.flush().await;

    assert_eq!(created_rx.requests().len(), 1);
    assert!(ended_rx.requests().is_empty());
    assert!(disabled_rx.requests().is_empty());
}

#[tokio::test]
async fn each_dispatch_gets_a_fresh_payload_id() {
    let receiver = Receiver::start(&[200]).await;
    let manager = WebhookManager::new(fast_config());
    manager
        .register(receiver.url(), "s", &["orders.submitted".into()], None)
        .unwrap();

    let event = "orders.submitted".parse().unwrap();
    let data = serde_json::json!({ "game_id": "g", "power": "ITALY", "order_count": 3 });
    let first = manager.dispatch(event, data.clone());
    let second = manager.dispatch(event, data);
    manager.flush().await;

    assert_ne!(first.id, second.id);
    let requests = receiver.requests();
    assert_eq!(requests.len(), 2);
    assert_ne!(requests[0].payload_id, requests[1].payload_id);
    assert_eq!(manager.stats().successful_deliveries, 2);
    assert_eq!(manager.stats().pending_deliveries, 0);
}
