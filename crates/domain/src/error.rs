/// Shared error type used across all Concord crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The operation is illegal for the current game status or phase
    /// (start when not pending, submit when not active, resume when not
    /// paused, and so on). Surfaced synchronously; never produces events.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Malformed input: orders the rules engine rejects, unknown webhook
    /// event types, unparseable identifiers.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A transient provider or HTTP failure. Absorbed by the retry layers;
    /// reaches the caller only once the retry budget is exhausted.
    #[error("transient: {0}")]
    Transient(String),

    /// Vault decryption failed: wrong password or tampered ciphertext.
    #[error("authentication failure: {0}")]
    AuthenticationFailure(String),

    /// The rules engine returned an unexpected error during resolution.
    /// The engine is deterministic on valid state, so this indicates state
    /// corruption and pauses the session.
    #[error("engine: {0}")]
    Engine(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
