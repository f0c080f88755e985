//! The rules-engine capability seam.
//!
//! Adjudication is consumed, never implemented, by the orchestration core:
//! the orchestrator and session call through this narrow trait and treat
//! the engine as deterministic on valid state. `concord-engine` ships a
//! simplified in-process implementation for tests and local matches.

use crate::error::Result;
use crate::game::{GameState, Power, ResolutionReport};
use crate::order::{BuildOrder, MovementOrder, RetreatOrder};

/// Pure-function adjudication interface.
///
/// `submit_*` validate orders against the state and record them into the
/// state's order buffers; `resolve_*` consume the buffers, mutate the board
/// and advance `year`/`season`/`phase` to the next stage of the turn.
pub trait RulesEngine: Send + Sync {
    /// A fresh standard game: Spring 1901, Diplomacy phase.
    fn initial_state(&self) -> Result<GameState>;

    fn submit_movement_orders(
        &self,
        state: &mut GameState,
        power: Power,
        orders: &[MovementOrder],
    ) -> Result<()>;

    fn submit_retreat_orders(
        &self,
        state: &mut GameState,
        power: Power,
        orders: &[RetreatOrder],
    ) -> Result<()>;

    fn submit_build_orders(
        &self,
        state: &mut GameState,
        power: Power,
        orders: &[BuildOrder],
    ) -> Result<()>;

    fn resolve_movement(&self, state: &mut GameState) -> Result<ResolutionReport>;

    fn resolve_retreats(&self, state: &mut GameState) -> Result<ResolutionReport>;

    fn resolve_builds(&self, state: &mut GameState) -> Result<ResolutionReport>;

    /// Engines carrying caches may need more than a memcpy here.
    fn clone_state(&self, state: &GameState) -> GameState {
        state.clone()
    }
}
