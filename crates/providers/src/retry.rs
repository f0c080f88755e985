//! Bounded retry with exponential backoff and a single optional fallback
//! model.
//!
//! Attempt `k` (0-based) that fails sleeps `base · 2^k · (0.5 + rand[0,1))`
//! before the next try — full ±50% jitter so seven agents rate-limited at
//! once do not retry in lockstep. After the primary budget is exhausted the
//! fallback model, when configured, is tried exactly once.

use std::sync::Arc;
use std::time::Duration;

use concord_domain::config::RetryConfig;
use concord_domain::error::{Error, Result};

use crate::classify::classify_error;
use crate::metrics::{RetryMetrics, RetryMetricsSnapshot};
use crate::traits::{Completion, CompletionRequest, LlmClient};

/// A successful driver call: the completion plus how it was obtained.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub completion: Completion,
    pub used_fallback: bool,
    /// Requests issued, including the fallback one.
    pub attempts: u32,
}

pub struct RetryDriver {
    client: Arc<dyn LlmClient>,
    config: RetryConfig,
    metrics: Arc<RetryMetrics>,
}

impl RetryDriver {
    pub fn new(client: Arc<dyn LlmClient>, config: RetryConfig, metrics: Arc<RetryMetrics>) -> Self {
        Self {
            client,
            config,
            metrics,
        }
    }

    pub fn metrics(&self) -> RetryMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Drive `complete` to success or exhaustion.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<RetryOutcome> {
        let max_retries = self.config.max_retries.max(1);
        let mut last_error: Option<Error> = None;

        for attempt in 0..max_retries {
            self.metrics.record_attempt();
            match self.client.complete(request).await {
                Ok(completion) => {
                    if attempt == 0 {
                        self.metrics.record_first_try_success();
                    } else {
                        self.metrics.record_retry_success();
                    }
                    return Ok(RetryOutcome {
                        completion,
                        used_fallback: false,
                        attempts: attempt + 1,
                    });
                }
                Err(err) => {
                    let class = classify_error(&err.to_string());
                    self.metrics.record_error(class);
                    tracing::warn!(
                        model = %request.model,
                        attempt = attempt + 1,
                        max_retries,
                        class = %class,
                        error = %err,
                        "llm call failed"
                    );
                    last_error = Some(err);
                    if attempt + 1 < max_retries {
                        tokio::time::sleep(backoff_delay(self.config.base_delay_ms, attempt))
                            .await;
                    }
                }
            }
        }

        if let Some(fallback_model) = &self.config.fallback_model {
            tracing::warn!(
                primary = %request.model,
                fallback = %fallback_model,
                "primary model exhausted, trying fallback"
            );
            let mut fallback_request = request.clone();
            fallback_request.model = fallback_model.clone();

            self.metrics.record_attempt();
            match self.client.complete(&fallback_request).await {
                Ok(completion) => {
                    self.metrics.record_fallback_success();
                    return Ok(RetryOutcome {
                        completion,
                        used_fallback: true,
                        attempts: max_retries + 1,
                    });
                }
                Err(err) => {
                    self.metrics.record_error(classify_error(&err.to_string()));
                    self.metrics.record_failure();
                    return Err(err);
                }
            }
        }

        self.metrics.record_failure();
        Err(last_error.unwrap_or_else(|| Error::Transient("llm call failed".into())))
    }
}

/// `base · 2^k` with full ±50% jitter.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let exponential = base_ms.saturating_mul(1u64 << attempt.min(16));
    let jitter = 0.5 + rand::random::<f64>();
    Duration::from_millis((exponential as f64 * jitter) as u64)
}
