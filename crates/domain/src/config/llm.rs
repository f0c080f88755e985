use serde::{Deserialize, Serialize};

use super::ConfigIssue;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM retry policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Retry/fallback policy wrapped around the LLM capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts against the primary model.
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    /// Backoff base; attempt `k` (0-based) sleeps
    /// `base · 2^k · (0.5 + jitter)` before retrying.
    #[serde(default = "d_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Tried exactly once after the primary budget is exhausted.
    #[serde(default)]
    pub fallback_model: Option<String>,
}

fn d_max_retries() -> u32 {
    3
}
fn d_base_delay_ms() -> u64 {
    1_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: d_max_retries(),
            base_delay_ms: d_base_delay_ms(),
            fallback_model: None,
        }
    }
}

impl RetryConfig {
    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        if self.max_retries == 0 {
            issues.push(ConfigIssue::error("llm.max_retries", "must be at least 1"));
        }
        if let Some(model) = &self.fallback_model {
            if model.is_empty() {
                issues.push(ConfigIssue::error(
                    "llm.fallback_model",
                    "must not be empty when set",
                ));
            }
        }
    }
}
