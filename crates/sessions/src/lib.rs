//! Game sessions: one per running match.
//!
//! A [`GameSession`] binds a rules-engine state, a phase orchestrator and
//! an event bus into a single lifecycle, enforces status-legal transitions,
//! and produces self-contained snapshots. The [`SessionManager`] is the
//! process-wide registry the gateway serves from.

pub mod manager;
pub mod session;
pub mod snapshot;

pub use manager::{SessionManager, SessionSummary};
pub use session::GameSession;
pub use snapshot::GameSessionSnapshot;
