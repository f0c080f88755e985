//! Per-game phase and deadline orchestration.
//!
//! The orchestrator enforces phase progression: it tracks which powers have
//! submitted orders, nudges laggards ahead of the deadline, substitutes
//! default orders on timeout, and requests resolution once every active
//! power is in (subject to a minimum phase floor). Every decision it makes
//! is visible as a [`concord_domain::event::GameEvent`] on the bus.

pub mod bus;
pub mod defaults;
pub mod orchestrator;
pub mod phase;
mod timer;

pub use bus::{EventBus, Subscription};
pub use orchestrator::{PhaseOrchestrator, SharedGameState};
pub use phase::{AgentHandle, PhaseStatus, SubmissionStatus};
