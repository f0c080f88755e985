use serde::{Deserialize, Serialize};

use super::ConfigIssue;
use crate::game::PhaseKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Phase/deadline policy for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "d_diplomacy_ms")]
    pub diplomacy_phase_duration_ms: u64,
    #[serde(default = "d_movement_ms")]
    pub movement_phase_duration_ms: u64,
    #[serde(default = "d_retreat_ms")]
    pub retreat_phase_duration_ms: u64,
    #[serde(default = "d_build_ms")]
    pub build_phase_duration_ms: u64,
    /// How long before the deadline pending powers get nudged.
    #[serde(default = "d_nudge_ms")]
    pub nudge_before_deadline_ms: u64,
    /// Consecutive missed deadlines before an agent is declared inactive.
    #[serde(default = "d_max_missed")]
    pub max_missed_deadlines: u32,
    /// Submit default orders for powers that miss the deadline.
    #[serde(default = "d_true")]
    pub auto_hold_on_timeout: bool,
    /// Resolve as soon as every active power has submitted.
    #[serde(default = "d_true")]
    pub auto_resolve_on_complete: bool,
    /// Floor below which auto-resolve is deferred even when everyone has
    /// submitted. Prevents phase churn when agents answer instantly.
    #[serde(default = "d_min_phase_ms")]
    pub min_phase_duration_ms: u64,
}

fn d_diplomacy_ms() -> u64 {
    300_000
}
fn d_movement_ms() -> u64 {
    120_000
}
fn d_retreat_ms() -> u64 {
    60_000
}
fn d_build_ms() -> u64 {
    60_000
}
fn d_nudge_ms() -> u64 {
    30_000
}
fn d_max_missed() -> u32 {
    3
}
fn d_true() -> bool {
    true
}
fn d_min_phase_ms() -> u64 {
    1_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            diplomacy_phase_duration_ms: d_diplomacy_ms(),
            movement_phase_duration_ms: d_movement_ms(),
            retreat_phase_duration_ms: d_retreat_ms(),
            build_phase_duration_ms: d_build_ms(),
            nudge_before_deadline_ms: d_nudge_ms(),
            max_missed_deadlines: d_max_missed(),
            auto_hold_on_timeout: true,
            auto_resolve_on_complete: true,
            min_phase_duration_ms: d_min_phase_ms(),
        }
    }
}

impl OrchestratorConfig {
    pub fn phase_duration_ms(&self, phase: PhaseKind) -> u64 {
        match phase {
            PhaseKind::Diplomacy => self.diplomacy_phase_duration_ms,
            PhaseKind::Movement => self.movement_phase_duration_ms,
            PhaseKind::Retreat => self.retreat_phase_duration_ms,
            PhaseKind::Build => self.build_phase_duration_ms,
        }
    }

    /// Apply a partial update, leaving unset fields untouched.
    pub fn apply(&mut self, patch: &OrchestratorConfigPatch) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = patch.$field.clone() {
                    self.$field = v;
                })*
            };
        }
        merge!(
            diplomacy_phase_duration_ms,
            movement_phase_duration_ms,
            retreat_phase_duration_ms,
            build_phase_duration_ms,
            nudge_before_deadline_ms,
            max_missed_deadlines,
            auto_hold_on_timeout,
            auto_resolve_on_complete,
            min_phase_duration_ms,
        );
    }

    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        if self.max_missed_deadlines == 0 {
            issues.push(ConfigIssue::error(
                "orchestrator.max_missed_deadlines",
                "must be at least 1",
            ));
        }
        for (field, duration) in [
            ("diplomacy_phase_duration_ms", self.diplomacy_phase_duration_ms),
            ("movement_phase_duration_ms", self.movement_phase_duration_ms),
            ("retreat_phase_duration_ms", self.retreat_phase_duration_ms),
            ("build_phase_duration_ms", self.build_phase_duration_ms),
        ] {
            if self.nudge_before_deadline_ms >= duration {
                issues.push(ConfigIssue::warning(
                    format!("orchestrator.{field}"),
                    "nudge window covers the whole phase; no nudge will fire",
                ));
            }
        }
    }
}

/// Partial [`OrchestratorConfig`] used by `update_config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfigPatch {
    pub diplomacy_phase_duration_ms: Option<u64>,
    pub movement_phase_duration_ms: Option<u64>,
    pub retreat_phase_duration_ms: Option<u64>,
    pub build_phase_duration_ms: Option<u64>,
    pub nudge_before_deadline_ms: Option<u64>,
    pub max_missed_deadlines: Option<u32>,
    pub auto_hold_on_timeout: Option<bool>,
    pub auto_resolve_on_complete: Option<bool>,
    pub min_phase_duration_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_defaults() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.diplomacy_phase_duration_ms, 300_000);
        assert_eq!(cfg.movement_phase_duration_ms, 120_000);
        assert_eq!(cfg.retreat_phase_duration_ms, 60_000);
        assert_eq!(cfg.build_phase_duration_ms, 60_000);
        assert_eq!(cfg.nudge_before_deadline_ms, 30_000);
        assert_eq!(cfg.max_missed_deadlines, 3);
        assert!(cfg.auto_hold_on_timeout);
        assert!(cfg.auto_resolve_on_complete);
        assert_eq!(cfg.min_phase_duration_ms, 1_000);
    }

    #[test]
    fn patch_merges_only_set_fields() {
        let mut cfg = OrchestratorConfig::default();
        cfg.apply(&OrchestratorConfigPatch {
            movement_phase_duration_ms: Some(5_000),
            auto_hold_on_timeout: Some(false),
            ..Default::default()
        });
        assert_eq!(cfg.movement_phase_duration_ms, 5_000);
        assert!(!cfg.auto_hold_on_timeout);
        assert_eq!(cfg.diplomacy_phase_duration_ms, 300_000);
    }

    #[test]
    fn nudge_covering_phase_warns() {
        let cfg = OrchestratorConfig {
            retreat_phase_duration_ms: 10_000,
            nudge_before_deadline_ms: 30_000,
            ..Default::default()
        };
        let mut issues = Vec::new();
        cfg.validate(&mut issues);
        assert!(issues
            .iter()
            .any(|i| i.field.contains("retreat_phase_duration_ms")));
    }
}
