use serde::{Deserialize, Serialize};

use super::ConfigIssue;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Webhook delivery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Delivery policy shared by every webhook registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDeliveryConfig {
    /// Attempts per delivery before the payload is dead-lettered.
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    /// Backoff base; attempt `k` sleeps `base · 2^(k-1)` ms.
    #[serde(default = "d_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Per-attempt HTTP timeout.
    #[serde(default = "d_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

fn d_max_retries() -> u32 {
    3
}
fn d_base_delay_ms() -> u64 {
    1_000
}
fn d_delivery_timeout_ms() -> u64 {
    10_000
}

impl Default for WebhookDeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: d_max_retries(),
            base_delay_ms: d_base_delay_ms(),
            delivery_timeout_ms: d_delivery_timeout_ms(),
        }
    }
}

impl WebhookDeliveryConfig {
    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        if self.max_retries == 0 {
            issues.push(ConfigIssue::error(
                "webhooks.max_retries",
                "must be at least 1",
            ));
        }
        if self.delivery_timeout_ms == 0 {
            issues.push(ConfigIssue::error(
                "webhooks.delivery_timeout_ms",
                "must be non-zero",
            ));
        }
    }
}
