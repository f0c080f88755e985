//! Default ("safe") orders, used on deadline timeout and by callers whose
//! LLM retry budget is exhausted.
//!
//! Movement phases hold every unit, retreat phases disband every dislodged
//! unit, build phases waive builds and take owed disbands off the front of
//! the unit list in engine order.

use concord_domain::capability::RulesEngine;
use concord_domain::error::Result;
use concord_domain::game::{GameState, PhaseKind, Power};
use concord_domain::order::{BuildOrder, MovementOrder, RetreatOrder};

pub fn default_movement_orders(state: &GameState, power: Power) -> Vec<MovementOrder> {
    state
        .units_of(power)
        .map(|u| MovementOrder::hold(u.province.clone()))
        .collect()
}

pub fn default_retreat_orders(state: &GameState, power: Power) -> Vec<RetreatOrder> {
    state
        .dislodged_of(power)
        .map(|d| RetreatOrder::disband(d.unit.province.clone()))
        .collect()
}

pub fn default_build_orders(state: &GameState, power: Power) -> Vec<BuildOrder> {
    let pending = state.pending_builds.get(&power).copied().unwrap_or(0);
    if pending >= 0 {
        // Builds are waived by submitting nothing.
        return Vec::new();
    }
    state
        .units_of(power)
        .take((-pending) as usize)
        .map(|u| BuildOrder::Disband {
            province: u.province.clone(),
        })
        .collect()
}

/// Compute and record default orders for `power` in the current phase.
/// Returns the number of orders submitted.
pub fn submit_default_orders(
    engine: &dyn RulesEngine,
    state: &mut GameState,
    power: Power,
) -> Result<usize> {
    match state.phase {
        PhaseKind::Diplomacy | PhaseKind::Movement => {
            let orders = default_movement_orders(state, power);
            engine.submit_movement_orders(state, power, &orders)?;
            Ok(orders.len())
        }
        PhaseKind::Retreat => {
            let orders = default_retreat_orders(state, power);
            engine.submit_retreat_orders(state, power, &orders)?;
            Ok(orders.len())
        }
        PhaseKind::Build => {
            let orders = default_build_orders(state, power);
            engine.submit_build_orders(state, power, &orders)?;
            Ok(orders.len())
        }
    }
}
