//! Accumulated retry metrics.
//!
//! One `RetryMetrics` handle is shared by every driver in the process (the
//! gateway creates it at boot and hands out clones); tests construct their
//! own to stay isolated.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::classify::ErrorClass;

#[derive(Default)]
pub struct RetryMetrics {
    total_attempts: AtomicU64,
    first_try_successes: AtomicU64,
    retry_successes: AtomicU64,
    fallback_successes: AtomicU64,
    total_failures: AtomicU64,
    error_counts: Mutex<BTreeMap<ErrorClass, u64>>,
}

/// A point-in-time copy, suitable for the stats API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryMetricsSnapshot {
    pub total_attempts: u64,
    pub first_try_successes: u64,
    pub retry_successes: u64,
    pub fallback_successes: u64,
    pub total_failures: u64,
    pub error_counts: BTreeMap<ErrorClass, u64>,
}

impl RetryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_attempt(&self) {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_first_try_success(&self) {
        self.first_try_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry_success(&self) {
        self.retry_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback_success(&self) {
        self.fallback_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self, class: ErrorClass) {
        *self.error_counts.lock().entry(class).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> RetryMetricsSnapshot {
        RetryMetricsSnapshot {
            total_attempts: self.total_attempts.load(Ordering::Relaxed),
            first_try_successes: self.first_try_successes.load(Ordering::Relaxed),
            retry_successes: self.retry_successes.load(Ordering::Relaxed),
            fallback_successes: self.fallback_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            error_counts: self.error_counts.lock().clone(),
        }
    }
}
