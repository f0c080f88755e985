//! LLM capability seam and the retry/fallback driver.
//!
//! Agents never talk to a provider directly: they go through
//! [`retry::RetryDriver`], which turns the unreliable single-method
//! [`traits::LlmClient`] capability into a bounded, observable one.

pub mod classify;
pub mod metrics;
pub mod retry;
pub mod traits;

pub use classify::{classify_error, ErrorClass};
pub use metrics::{RetryMetrics, RetryMetricsSnapshot};
pub use retry::{RetryDriver, RetryOutcome};
pub use traits::{Completion, CompletionRequest, LlmClient, Message, Role, Usage};
