//! The process-wide webhook manager.
//!
//! One lock guards the registration table, the delivery log and the
//! dead-letter queue; HTTP traffic and backoff sleeps happen outside it.
//! Delivery tasks are fire-and-forget from the dispatcher's perspective;
//! `flush` awaits whatever is still in flight.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use concord_domain::config::WebhookDeliveryConfig;
use concord_domain::error::Result;
use concord_domain::event::WebhookEventType;

use crate::signing::{sign_payload, SIGNATURE_HEADER};
use crate::types::{
    DeadLetterEntry, DeliveryAttempt, DeliveryRecord, WebhookPayload, WebhookRegistration,
    WebhookStats,
};

#[derive(Clone)]
pub struct WebhookManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: WebhookDeliveryConfig,
    http: reqwest::Client,
    table: Mutex<Table>,
    pending: AtomicUsize,
    drained: Notify,
}

#[derive(Default)]
struct Table {
    registrations: Vec<WebhookRegistration>,
    delivery_log: Vec<DeliveryRecord>,
    dead_letters: Vec<DeadLetterEntry>,
}

impl WebhookManager {
    pub fn new(config: WebhookDeliveryConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config,
                http: reqwest::Client::new(),
                table: Mutex::new(Table::default()),
                pending: AtomicUsize::new(0),
                drained: Notify::new(),
            }),
        }
    }

    // ── Registry ───────────────────────────────────────────────────

    /// Register a subscriber. Every entry in `event_types` must name a
    /// known webhook event; unknown strings are rejected.
    pub fn register(
        &self,
        url: impl Into<String>,
        secret: impl Into<String>,
        event_types: &[String],
        description: Option<String>,
    ) -> Result<WebhookRegistration> {
        let event_types = event_types
            .iter()
            .map(|s| s.parse::<WebhookEventType>())
            .collect::<Result<Vec<_>>>()?;

        let registration = WebhookRegistration {
            id: Uuid::new_v4(),
            url: url.into(),
            secret: secret.into(),
            event_types,
            active: true,
            created_at: Utc::now(),
            description,
        };
        tracing::info!(
            webhook_id = %registration.id,
            url = %registration.url,
            events = registration.event_types.len(),
            "webhook registered"
        );
        self.inner.table.lock().registrations.push(registration.clone());
        Ok(registration)
    }

    pub fn unregister(&self, id: Uuid) -> bool {
        let mut table = self.inner.table.lock();
        let before = table.registrations.len();
        table.registrations.retain(|r| r.id != id);
        table.registrations.len() != before
    }

    pub fn activate(&self, id: Uuid) -> bool {
        self.set_active(id, true)
    }

    pub fn deactivate(&self, id: Uuid) -> bool {
        self.set_active(id, false)
    }

    fn set_active(&self, id: Uuid, active: bool) -> bool {
        let mut table = self.inner.table.lock();
        match table.registrations.iter_mut().find(|r| r.id == id) {
            Some(registration) => {
                registration.active = active;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<WebhookRegistration> {
        self.inner
            .table
            .lock()
            .registrations
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn list(&self) -> Vec<WebhookRegistration> {
        self.inner.table.lock().registrations.clone()
    }

    // ── Dispatch ───────────────────────────────────────────────────

    /// Build one payload and schedule a delivery to every active
    /// registration subscribed to `event`. Fire-and-forget: the returned
    /// payload is already on its way (or nowhere, if nobody listens).
    pub fn dispatch(&self, event: WebhookEventType, data: serde_json::Value) -> WebhookPayload {
        let payload = WebhookPayload::new(event, data);

        let targets: Vec<WebhookRegistration> = self
            .inner
            .table
            .lock()
            .registrations
            .iter()
            .filter(|r| r.active && r.event_types.contains(&event))
            .cloned()
            .collect();

        tracing::debug!(
            payload_id = %payload.id,
            event = %event,
            targets = targets.len(),
            "dispatching webhook event"
        );
        for registration in targets {
            self.spawn_delivery(registration, payload.clone());
        }
        payload
    }

    /// Await completion of every in-flight delivery.
    pub async fn flush(&self) {
        loop {
            let notified = self.inner.drained.notified();
            if self.inner.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    // ── Dead letters ───────────────────────────────────────────────

    pub fn get_dead_letters(&self) -> Vec<DeadLetterEntry> {
        self.inner.table.lock().dead_letters.clone()
    }

    /// Drop every dead letter, returning how many were removed.
    pub fn clear_dead_letters(&self) -> usize {
        let mut table = self.inner.table.lock();
        let count = table.dead_letters.len();
        table.dead_letters.clear();
        count
    }

    /// Remove a dead letter and redeliver its payload against the current
    /// registration. Returns false if the entry or its registration is
    /// gone.
    pub fn retry_dead_letter(&self, id: Uuid) -> bool {
        let (entry, registration) = {
            let mut table = self.inner.table.lock();
            let Some(position) = table.dead_letters.iter().position(|d| d.id == id) else {
                return false;
            };
            let webhook_id = table.dead_letters[position].webhook_id;
            let Some(registration) = table
                .registrations
                .iter()
                .find(|r| r.id == webhook_id)
                .cloned()
            else {
                return false;
            };
            (table.dead_letters.remove(position), registration)
        };

        tracing::info!(
            dead_letter_id = %id,
            payload_id = %entry.payload.id,
            "retrying dead letter"
        );
        self.spawn_delivery(registration, entry.payload);
        true
    }

    // ── Introspection ──────────────────────────────────────────────

    pub fn delivery_log(&self) -> Vec<DeliveryRecord> {
        self.inner.table.lock().delivery_log.clone()
    }

    pub fn stats(&self) -> WebhookStats {
        let table = self.inner.table.lock();
        WebhookStats {
            registrations: table.registrations.len(),
            active_registrations: table.registrations.iter().filter(|r| r.active).count(),
            total_deliveries: table.delivery_log.len(),
            successful_deliveries: table.delivery_log.iter().filter(|d| d.delivered).count(),
            failed_deliveries: table.delivery_log.iter().filter(|d| !d.delivered).count(),
            dead_letters: table.dead_letters.len(),
            pending_deliveries: self.inner.pending.load(Ordering::Acquire),
        }
    }

    // ── Delivery ───────────────────────────────────────────────────

    fn spawn_delivery(&self, registration: WebhookRegistration, payload: WebhookPayload) {
        let inner = self.inner.clone();
        inner.pending.fetch_add(1, Ordering::AcqRel);
        tokio::spawn(async move {
            ManagerInner::deliver(&inner, registration, payload).await;
            if inner.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                inner.drained.notify_waiters();
            }
        });
    }
}

impl ManagerInner {
    /// Drive one payload to one registration: sign, POST with a per-attempt
    /// timeout, back off between attempts, and dead-letter on exhaustion.
    async fn deliver(
        inner: &Arc<ManagerInner>,
        registration: WebhookRegistration,
        payload: WebhookPayload,
    ) {
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(payload_id = %payload.id, error = %err, "unserializable payload");
                return;
            }
        };
        let signature = sign_payload(&registration.secret, &body);
        let timeout = Duration::from_millis(inner.config.delivery_timeout_ms);

        let mut attempts: Vec<DeliveryAttempt> = Vec::new();
        let mut delivered = false;

        for attempt_number in 1..=inner.config.max_retries {
            let request = inner
                .http
                .post(&registration.url)
                .header("Content-Type", "application/json")
                .header(SIGNATURE_HEADER, &signature)
                .header("X-Webhook-Event", payload.event.as_str())
                .header("X-Webhook-Id", payload.id.to_string())
                .header("X-Webhook-Timestamp", payload.timestamp.to_rfc3339())
                .body(body.clone());

            let attempt = match tokio::time::timeout(timeout, request.send()).await {
                Ok(Ok(response)) => {
                    let status = response.status();
                    DeliveryAttempt {
                        attempt_number,
                        timestamp: Utc::now(),
                        status_code: Some(status.as_u16()),
                        error: (!status.is_success()).then(|| format!("HTTP {status}")),
                        success: status.is_success(),
                    }
                }
                Ok(Err(err)) => DeliveryAttempt {
                    attempt_number,
                    timestamp: Utc::now(),
                    status_code: None,
                    error: Some(err.to_string()),
                    success: false,
                },
                Err(_) => DeliveryAttempt {
                    attempt_number,
                    timestamp: Utc::now(),
                    status_code: None,
                    error: Some(format!(
                        "delivery timed out after {}ms",
                        inner.config.delivery_timeout_ms
                    )),
                    success: false,
                },
            };

            delivered = attempt.success;
            let error = attempt.error.clone();
            attempts.push(attempt);

            if delivered {
                break;
            }
            tracing::warn!(
                webhook_id = %registration.id,
                payload_id = %payload.id,
                attempt = attempt_number,
                error = error.as_deref().unwrap_or("unknown"),
                "webhook delivery attempt failed"
            );
            if attempt_number < inner.config.max_retries {
                let backoff = inner.config.base_delay_ms * (1 << (attempt_number - 1));
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }

        let record = DeliveryRecord {
            id: Uuid::new_v4(),
            webhook_id: registration.id,
            payload_id: payload.id,
            event: payload.event,
            attempts: attempts.clone(),
            delivered,
            created_at: Utc::now(),
        };

        let mut table = inner.table.lock();
        table.delivery_log.push(record);
        if !delivered {
            let reason = attempts
                .last()
                .and_then(|a| a.error.clone())
                .unwrap_or_else(|| "delivery failed".into());
            tracing::warn!(
                webhook_id = %registration.id,
                payload_id = %payload.id,
                reason = %reason,
                "delivery exhausted, dead-lettering"
            );
            table.dead_letters.push(DeadLetterEntry {
                id: Uuid::new_v4(),
                webhook_id: registration.id,
                webhook_url: registration.url.clone(),
                payload,
                attempts,
                failed_at: Utc::now(),
                reason,
            });
        }
    }
}
