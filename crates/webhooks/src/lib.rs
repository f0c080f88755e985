//! Webhook fan-out: subscriber registry, HMAC-signed delivery with bounded
//! retries, and a dead-letter queue for exhausted payloads.
//!
//! Delivery is at-least-once. Dispatches from a single event are issued in
//! registration order but execute concurrently, and retries for an earlier
//! event may land after later events — subscribers must dedupe by
//! `payload.id`.

pub mod global;
pub mod manager;
pub mod signing;
pub mod types;

pub use manager::WebhookManager;
pub use signing::{sign_payload, verify_signature, SIGNATURE_HEADER};
pub use types::{
    DeadLetterEntry, DeliveryAttempt, DeliveryRecord, WebhookPayload, WebhookRegistration,
    WebhookStats,
};
