//! Deterministic in-process rules engine.
//!
//! `BasicEngine` implements the [`RulesEngine`] capability with a
//! simplified adjudicator: holds, moves with bounce/follow resolution, no
//! support strength and no convoys (so no unit is ever dislodged by it),
//! retreat placement/disband, and build/disband bookkeeping. It exists so
//! the orchestration stack and its tests run hermetically; production
//! matches plug a full adjudicator through the same trait.

pub mod board;

use std::collections::BTreeMap;

use concord_domain::capability::RulesEngine;
use concord_domain::error::{Error, Result};
use concord_domain::game::{
    DislodgedUnit, GameState, PhaseKind, Power, Province, ResolutionReport, Season, Unit,
};
use concord_domain::order::{BuildOrder, MovementOrder, RetreatOrder};

#[derive(Debug, Default, Clone, Copy)]
pub struct BasicEngine;

impl BasicEngine {
    pub fn new() -> Self {
        Self
    }

    fn require_phase(state: &GameState, wanted: &str, ok: bool) -> Result<()> {
        if ok {
            Ok(())
        } else {
            Err(Error::Engine(format!(
                "cannot {wanted} during {} phase",
                state.phase
            )))
        }
    }

    /// Post-movement bookkeeping shared by movement and retreat resolution:
    /// fall center capture, build computation, and phase/season advance.
    fn advance_after_movement(state: &mut GameState) {
        if state.season == Season::Fall {
            // A power owns each center its units occupy at the end of fall.
            for unit in &state.units {
                if board::is_supply_center(&unit.province) {
                    state.supply_centers.insert(unit.province.clone(), unit.power);
                }
            }

            let mut pending: BTreeMap<Power, i32> = BTreeMap::new();
            for power in Power::ALL {
                let delta =
                    state.center_count(power) as i32 - state.units_of(power).count() as i32;
                if delta != 0 {
                    pending.insert(power, delta);
                }
            }

            if pending.is_empty() {
                state.year += 1;
                state.season = Season::Spring;
                state.phase = PhaseKind::Diplomacy;
            } else {
                state.pending_builds = pending;
                state.phase = PhaseKind::Build;
            }
        } else {
            state.season = Season::Fall;
            state.phase = PhaseKind::Diplomacy;
        }
    }
}

impl RulesEngine for BasicEngine {
    fn initial_state(&self) -> Result<GameState> {
        let units = board::STARTING_UNITS
            .iter()
            .map(|(power, kind, province)| Unit {
                kind: *kind,
                power: *power,
                province: (*province).to_string(),
            })
            .collect();

        let supply_centers = board::HOME_CENTERS
            .iter()
            .map(|(power, province)| ((*province).to_string(), *power))
            .collect();

        Ok(GameState {
            year: 1901,
            season: Season::Spring,
            phase: PhaseKind::Diplomacy,
            units,
            supply_centers,
            dislodged: Vec::new(),
            pending_builds: BTreeMap::new(),
            movement_orders: BTreeMap::new(),
            retreat_orders: BTreeMap::new(),
            build_orders: BTreeMap::new(),
        })
    }

    fn submit_movement_orders(
        &self,
        state: &mut GameState,
        power: Power,
        orders: &[MovementOrder],
    ) -> Result<()> {
        Self::require_phase(
            state,
            "submit movement orders",
            state.phase.accepts_movement_orders(),
        )?;

        let mut seen: Vec<&Province> = Vec::new();
        for order in orders {
            let province = order.unit_province();
            let owned = state
                .units_of(power)
                .any(|u| u.province == *province);
            if !owned {
                return Err(Error::InvalidInput(format!(
                    "{power} has no unit in {province}"
                )));
            }
            if seen.contains(&province) {
                return Err(Error::InvalidInput(format!(
                    "duplicate order for unit in {province}"
                )));
            }
            seen.push(province);
            if let MovementOrder::Move { from, to } = order {
                if from == to {
                    return Err(Error::InvalidInput(format!(
                        "move from {from} to itself"
                    )));
                }
            }
        }

        state.movement_orders.insert(power, orders.to_vec());
        Ok(())
    }

    fn submit_retreat_orders(
        &self,
        state: &mut GameState,
        power: Power,
        orders: &[RetreatOrder],
    ) -> Result<()> {
        Self::require_phase(
            state,
            "submit retreat orders",
            state.phase == PhaseKind::Retreat,
        )?;

        for order in orders {
            let dislodged = state
                .dislodged_of(power)
                .any(|d| d.unit.province == order.province);
            if !dislodged {
                return Err(Error::InvalidInput(format!(
                    "{power} has no dislodged unit in {}",
                    order.province
                )));
            }
        }

        state.retreat_orders.insert(power, orders.to_vec());
        Ok(())
    }

    fn submit_build_orders(
        &self,
        state: &mut GameState,
        power: Power,
        orders: &[BuildOrder],
    ) -> Result<()> {
        Self::require_phase(state, "submit build orders", state.phase == PhaseKind::Build)?;

        let pending = state.pending_builds.get(&power).copied().unwrap_or(0);
        if pending == 0 {
            return Err(Error::InvalidInput(format!(
                "{power} has no adjustments this phase"
            )));
        }

        let builds = orders
            .iter()
            .filter(|o| matches!(o, BuildOrder::Build { .. }))
            .count() as i32;
        let disbands = orders
            .iter()
            .filter(|o| matches!(o, BuildOrder::Disband { .. }))
            .count() as i32;

        if pending > 0 && (disbands > 0 || builds > pending) {
            return Err(Error::InvalidInput(format!(
                "{power} may build at most {pending} units"
            )));
        }
        if pending < 0 && (builds > 0 || disbands > -pending) {
            return Err(Error::InvalidInput(format!(
                "{power} must disband {} units",
                -pending
            )));
        }

        for order in orders {
            match order {
                BuildOrder::Build { province, .. } => {
                    let home = board::HOME_CENTERS
                        .iter()
                        .any(|(p, prov)| *p == power && *prov == province);
                    let owned = state.supply_centers.get(province) == Some(&power);
                    let occupied = state.units.iter().any(|u| u.province == *province);
                    if !home || !owned || occupied {
                        return Err(Error::InvalidInput(format!(
                            "{power} cannot build in {province}"
                        )));
                    }
                }
                BuildOrder::Disband { province } => {
                    if !state.units_of(power).any(|u| u.province == *province) {
                        return Err(Error::InvalidInput(format!(
                            "{power} has no unit in {province} to disband"
                        )));
                    }
                }
                BuildOrder::Waive => {}
            }
        }

        state.build_orders.insert(power, orders.to_vec());
        Ok(())
    }

    fn resolve_movement(&self, state: &mut GameState) -> Result<ResolutionReport> {
        Self::require_phase(
            state,
            "resolve movement",
            state.phase.accepts_movement_orders(),
        )?;

        let moves: Vec<(Power, Province, Province)> = state
            .movement_orders
            .values()
            .flatten()
            .filter_map(|order| match order {
                MovementOrder::Move { from, to } => {
                    let power = state
                        .units
                        .iter()
                        .find(|u| u.province == *from)?
                        .power;
                    Some((power, from.clone(), to.clone()))
                }
                _ => None,
            })
            .collect();

        // Iterate to a fixpoint so follow-through chains resolve: a move
        // succeeds when it is the only claim on its destination and the
        // destination is empty or being vacated by another successful move.
        let mut succeeded = vec![false; moves.len()];
        loop {
            let mut progressed = false;
            for i in 0..moves.len() {
                if succeeded[i] {
                    continue;
                }
                let to = &moves[i].2;
                let contested = moves
                    .iter()
                    .enumerate()
                    .any(|(j, (_, _, other_to))| j != i && other_to == to);
                if contested {
                    continue;
                }
                let vacated = moves
                    .iter()
                    .enumerate()
                    .any(|(j, (_, other_from, _))| succeeded[j] && other_from == to);
                let blocked = !vacated && state.units.iter().any(|u| u.province == *to);
                if !blocked {
                    succeeded[i] = true;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        let mut report = ResolutionReport::default();
        for (i, (power, from, to)) in moves.iter().enumerate() {
            if succeeded[i] {
                if let Some(unit) = state
                    .units
                    .iter_mut()
                    .find(|u| u.province == *from && u.power == *power)
                {
                    unit.province = to.clone();
                }
                report.successful_moves += 1;
            } else {
                report.failed_moves += 1;
            }
        }
        report.dislodged_units = state.dislodged.len() as u32;

        state.movement_orders.clear();
        if state.dislodged.is_empty() {
            Self::advance_after_movement(state);
        } else {
            state.phase = PhaseKind::Retreat;
        }

        tracing::debug!(
            successful = report.successful_moves,
            failed = report.failed_moves,
            next_phase = %state.phase,
            "movement resolved"
        );
        Ok(report)
    }

    fn resolve_retreats(&self, state: &mut GameState) -> Result<ResolutionReport> {
        Self::require_phase(state, "resolve retreats", state.phase == PhaseKind::Retreat)?;

        let orders: BTreeMap<Province, Option<Province>> = state
            .retreat_orders
            .values()
            .flatten()
            .map(|o| (o.province.clone(), o.destination.clone()))
            .collect();

        let mut report = ResolutionReport::default();
        let dislodged = std::mem::take(&mut state.dislodged);
        for DislodgedUnit {
            unit,
            attacker_province,
        } in dislodged
        {
            let destination = orders.get(&unit.province).cloned().flatten();
            match destination {
                Some(dest)
                    if dest != attacker_province
                        && !state.units.iter().any(|u| u.province == dest)
                        && orders
                            .iter()
                            .filter(|(_, d)| d.as_deref() == Some(dest.as_str()))
                            .count()
                            == 1 =>
                {
                    state.units.push(Unit {
                        province: dest,
                        ..unit
                    });
                    report.successful_moves += 1;
                }
                // No order, contested destination, or illegal target: disband.
                _ => report.units_disbanded += 1,
            }
        }

        state.retreat_orders.clear();
        Self::advance_after_movement(state);
        Ok(report)
    }

    fn resolve_builds(&self, state: &mut GameState) -> Result<ResolutionReport> {
        Self::require_phase(state, "resolve builds", state.phase == PhaseKind::Build)?;

        let mut report = ResolutionReport::default();
        let pending = std::mem::take(&mut state.pending_builds);
        let orders = std::mem::take(&mut state.build_orders);

        for (power, delta) in pending {
            let submitted = orders.get(&power).cloned().unwrap_or_default();
            if delta > 0 {
                for order in submitted {
                    if let BuildOrder::Build { province, kind } = order {
                        state.units.push(Unit {
                            kind,
                            power,
                            province,
                        });
                        report.units_built += 1;
                    }
                }
                // Unused builds are waived.
            } else {
                let mut remaining = (-delta) as usize;
                for order in &submitted {
                    if remaining == 0 {
                        break;
                    }
                    if let BuildOrder::Disband { province } = order {
                        if let Some(pos) = state
                            .units
                            .iter()
                            .position(|u| u.power == power && u.province == *province)
                        {
                            state.units.remove(pos);
                            report.units_disbanded += 1;
                            remaining -= 1;
                        }
                    }
                }
                // Disbands still owed come off the front of the unit list.
                while remaining > 0 {
                    if let Some(pos) = state.units.iter().position(|u| u.power == power) {
                        state.units.remove(pos);
                        report.units_disbanded += 1;
                        remaining -= 1;
                    } else {
                        break;
                    }
                }
            }
        }

        state.year += 1;
        state.season = Season::Spring;
        state.phase = PhaseKind::Diplomacy;
        Ok(report)
    }
}
