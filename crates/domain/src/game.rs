//! Board-level game model: the closed identifier sets, unit and state
//! representations, and resolution reporting.
//!
//! `GameState` is plain data. The rules engine mutates it through the
//! [`crate::capability::RulesEngine`] trait; the orchestrator and session
//! only read it (active powers, default orders, supply-center diffs).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::order::{BuildOrder, MovementOrder, RetreatOrder};

/// A power wins outright by holding this many supply centers.
pub const VICTORY_CENTERS: usize = 18;

/// Province identifiers are opaque strings owned by the rules engine.
pub type Province = String;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Closed sets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The seven great powers. Unknown strings are rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Power {
    England,
    France,
    Germany,
    Italy,
    Austria,
    Russia,
    Turkey,
}

impl Power {
    /// All powers in canonical order.
    pub const ALL: [Power; 7] = [
        Power::England,
        Power::France,
        Power::Germany,
        Power::Italy,
        Power::Austria,
        Power::Russia,
        Power::Turkey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Power::England => "ENGLAND",
            Power::France => "FRANCE",
            Power::Germany => "GERMANY",
            Power::Italy => "ITALY",
            Power::Austria => "AUSTRIA",
            Power::Russia => "RUSSIA",
            Power::Turkey => "TURKEY",
        }
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Power {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ENGLAND" => Ok(Power::England),
            "FRANCE" => Ok(Power::France),
            "GERMANY" => Ok(Power::Germany),
            "ITALY" => Ok(Power::Italy),
            "AUSTRIA" => Ok(Power::Austria),
            "RUSSIA" => Ok(Power::Russia),
            "TURKEY" => Ok(Power::Turkey),
            other => Err(Error::InvalidInput(format!("unknown power '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    Spring,
    Fall,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "SPRING",
            Season::Fall => "FALL",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of a game turn.
///
/// `Diplomacy` is the phase in which agents negotiate *and* write their
/// movement orders; `Movement` is the order-only variant used by matches
/// that run without a negotiation window. Movement-order submission is
/// legal in either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseKind {
    Diplomacy,
    Movement,
    Retreat,
    Build,
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Diplomacy => "DIPLOMACY",
            PhaseKind::Movement => "MOVEMENT",
            PhaseKind::Retreat => "RETREAT",
            PhaseKind::Build => "BUILD",
        }
    }

    /// Whether movement orders are accepted during this phase.
    pub fn accepts_movement_orders(&self) -> bool {
        matches!(self, PhaseKind::Diplomacy | PhaseKind::Movement)
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lifecycle status.
///
/// Legal transitions: `Pending → Active → (Paused ↔ Active)* →
/// (Completed | Abandoned)`. Everything else is an `InvalidState` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Pending,
    Active,
    Paused,
    Completed,
    Abandoned,
}

impl GameStatus {
    pub fn can_transition_to(self, next: GameStatus) -> bool {
        use GameStatus::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Completed)
                | (Pending, Abandoned)
                | (Active, Abandoned)
                | (Paused, Abandoned)
        )
    }

    /// Completed and abandoned games accept no further operations.
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Completed | GameStatus::Abandoned)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GameStatus::Pending => "PENDING",
            GameStatus::Active => "ACTIVE",
            GameStatus::Paused => "PAUSED",
            GameStatus::Completed => "COMPLETED",
            GameStatus::Abandoned => "ABANDONED",
        };
        f.write_str(s)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Units & board state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Army,
    Fleet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub kind: UnitKind,
    pub power: Power,
    pub province: Province,
}

/// A unit forced out of its province during movement resolution, waiting
/// for a retreat order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DislodgedUnit {
    pub unit: Unit,
    /// Province the attack came from (a retreat may not go there).
    pub attacker_province: Province,
}

/// The complete board state plus the per-phase order buffers the engine
/// records into before resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub year: u16,
    pub season: Season,
    pub phase: PhaseKind,
    pub units: Vec<Unit>,
    /// Supply-center ownership, province → power. Unowned neutrals are absent.
    pub supply_centers: BTreeMap<Province, Power>,
    pub dislodged: Vec<DislodgedUnit>,
    /// Positive = builds owed, negative = disbands owed. Zero entries are absent.
    pub pending_builds: BTreeMap<Power, i32>,
    #[serde(default)]
    pub movement_orders: BTreeMap<Power, Vec<MovementOrder>>,
    #[serde(default)]
    pub retreat_orders: BTreeMap<Power, Vec<RetreatOrder>>,
    #[serde(default)]
    pub build_orders: BTreeMap<Power, Vec<BuildOrder>>,
}

impl GameState {
    pub fn units_of(&self, power: Power) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(move |u| u.power == power)
    }

    pub fn dislodged_of(&self, power: Power) -> impl Iterator<Item = &DislodgedUnit> {
        self.dislodged.iter().filter(move |d| d.unit.power == power)
    }

    /// Distinct powers with at least one unit, in canonical order.
    pub fn powers_with_units(&self) -> Vec<Power> {
        Power::ALL
            .into_iter()
            .filter(|p| self.units_of(*p).next().is_some())
            .collect()
    }

    /// Distinct powers with at least one pending dislodged unit.
    pub fn powers_with_dislodged(&self) -> Vec<Power> {
        Power::ALL
            .into_iter()
            .filter(|p| self.dislodged_of(*p).next().is_some())
            .collect()
    }

    /// Powers whose pending build count is non-zero.
    pub fn powers_with_adjustments(&self) -> Vec<Power> {
        Power::ALL
            .into_iter()
            .filter(|p| self.pending_builds.get(p).is_some_and(|n| *n != 0))
            .collect()
    }

    pub fn center_count(&self, power: Power) -> usize {
        self.supply_centers.values().filter(|p| **p == power).count()
    }

    /// The winning power, if any has reached the victory threshold.
    pub fn victor(&self) -> Option<Power> {
        Power::ALL
            .into_iter()
            .find(|p| self.center_count(*p) >= VICTORY_CENTERS)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolution reporting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Raw counts produced by a single rules-engine resolver call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub successful_moves: u32,
    pub failed_moves: u32,
    pub dislodged_units: u32,
    pub units_built: u32,
    pub units_disbanded: u32,
}

/// One supply-center ownership change observed across a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyChange {
    pub province: Province,
    pub from: Option<Power>,
    pub to: Power,
}

/// What a resolved phase did, as carried on `ORDERS_RESOLVED` events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionSummary {
    pub successful_moves: u32,
    pub failed_moves: u32,
    pub dislodged_units: u32,
    pub units_built: u32,
    pub units_disbanded: u32,
    pub supply_changes: Vec<SupplyChange>,
}

impl ResolutionSummary {
    /// Combine a resolver report with a supply-center diff.
    pub fn from_report(report: ResolutionReport, supply_changes: Vec<SupplyChange>) -> Self {
        Self {
            successful_moves: report.successful_moves,
            failed_moves: report.failed_moves,
            dislodged_units: report.dislodged_units,
            units_built: report.units_built,
            units_disbanded: report.units_disbanded,
            supply_changes,
        }
    }
}

/// Diff supply-center ownership between two snapshots.
pub fn diff_supply_centers(
    before: &BTreeMap<Province, Power>,
    after: &BTreeMap<Province, Power>,
) -> Vec<SupplyChange> {
    after
        .iter()
        .filter(|(province, owner)| before.get(*province) != Some(owner))
        .map(|(province, owner)| SupplyChange {
            province: province.clone(),
            from: before.get(province).copied(),
            to: *owner,
        })
        .collect()
}
