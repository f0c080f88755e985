//! Registry, delivery and dead-letter records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use concord_domain::event::WebhookEventType;

/// One subscriber endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRegistration {
    pub id: Uuid,
    pub url: String,
    /// HMAC key for this subscriber. Redacted by API surfaces.
    pub secret: String,
    pub event_types: Vec<WebhookEventType>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The wire payload. `data` is the flattened event body described in the
/// external-interface contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub id: Uuid,
    pub event: WebhookEventType,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl WebhookPayload {
    pub fn new(event: WebhookEventType, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event,
            timestamp: Utc::now(),
            data,
        }
    }
}

/// One HTTP attempt within a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    /// 1-based.
    pub attempt_number: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub success: bool,
}

/// The full story of delivering one payload to one registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub payload_id: Uuid,
    pub event: WebhookEventType,
    pub attempts: Vec<DeliveryAttempt>,
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
}

/// A payload whose delivery budget was exhausted, parked for operator
/// retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub webhook_url: String,
    pub payload: WebhookPayload,
    pub attempts: Vec<DeliveryAttempt>,
    pub failed_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookStats {
    pub registrations: usize,
    pub active_registrations: usize,
    pub total_deliveries: usize,
    pub successful_deliveries: usize,
    pub failed_deliveries: usize,
    pub dead_letters: usize,
    pub pending_deliveries: usize,
}
