//! Transient-error classification.
//!
//! Classes are matched by substring on the lowercased error message, first
//! match wins, so every error lands in exactly one class.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    RateLimit,
    Timeout,
    ServerError,
    BadGateway,
    ServiceUnavailable,
    NetworkError,
    Unknown,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::RateLimit => "rate_limit",
            ErrorClass::Timeout => "timeout",
            ErrorClass::ServerError => "server_error",
            ErrorClass::BadGateway => "bad_gateway",
            ErrorClass::ServiceUnavailable => "service_unavailable",
            ErrorClass::NetworkError => "network_error",
            ErrorClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a provider error by its message.
pub fn classify_error(message: &str) -> ErrorClass {
    let m = message.to_lowercase();
    if m.contains("rate limit") || m.contains("429") {
        ErrorClass::RateLimit
    } else if m.contains("timeout") || m.contains("timed out") {
        ErrorClass::Timeout
    } else if m.contains("500") || m.contains("internal server") {
        ErrorClass::ServerError
    } else if m.contains("502") || m.contains("bad gateway") {
        ErrorClass::BadGateway
    } else if m.contains("503") || m.contains("service unavailable") {
        ErrorClass::ServiceUnavailable
    } else if m.contains("network") || m.contains("econnrefused") || m.contains("econnreset") {
        ErrorClass::NetworkError
    } else {
        ErrorClass::Unknown
    }
}
