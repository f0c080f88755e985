//! Live per-phase bookkeeping and agent tracking.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use concord_domain::game::{PhaseKind, Power, Season};

/// Submission tracking for one active power within one phase. Created at
/// phase start, destroyed when the phase resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionStatus {
    pub power: Power,
    pub submitted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub order_count: usize,
}

impl SubmissionStatus {
    pub fn pending(power: Power) -> Self {
        Self {
            power,
            submitted: false,
            submitted_at: None,
            order_count: 0,
        }
    }
}

/// Non-null exactly while a phase is in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStatus {
    pub year: u16,
    pub season: Season,
    pub phase: PhaseKind,
    pub deadline_ts: DateTime<Utc>,
    pub started_at_ts: DateTime<Utc>,
    pub submissions: BTreeMap<Power, SubmissionStatus>,
    pub nudge_sent: bool,
}

impl PhaseStatus {
    pub fn all_submitted(&self) -> bool {
        self.submissions.values().all(|s| s.submitted)
    }

    pub fn pending_powers(&self) -> Vec<Power> {
        self.submissions
            .values()
            .filter(|s| !s.submitted)
            .map(|s| s.power)
            .collect()
    }
}

/// One registered agent seat. Mutated only by the orchestrator, on
/// submission, timeout, or an explicit activity mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentHandle {
    pub power: Power,
    pub agent_id: String,
    pub is_responsive: bool,
    pub last_activity_ts: DateTime<Utc>,
    pub missed_deadlines: u32,
}

impl AgentHandle {
    pub fn new(power: Power, agent_id: impl Into<String>) -> Self {
        Self {
            power,
            agent_id: agent_id.into(),
            is_responsive: true,
            last_activity_ts: Utc::now(),
            missed_deadlines: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_submitted_and_pending_powers() {
        let mut status = PhaseStatus {
            year: 1901,
            season: Season::Spring,
            phase: PhaseKind::Diplomacy,
            deadline_ts: Utc::now(),
            started_at_ts: Utc::now(),
            submissions: BTreeMap::new(),
            nudge_sent: false,
        };
        status
            .submissions
            .insert(Power::England, SubmissionStatus::pending(Power::England));
        status
            .submissions
            .insert(Power::France, SubmissionStatus::pending(Power::France));

        assert!(!status.all_submitted());
        assert_eq!(
            status.pending_powers(),
            vec![Power::England, Power::France]
        );

        status.submissions.get_mut(&Power::England).unwrap().submitted = true;
        status.submissions.get_mut(&Power::France).unwrap().submitted = true;
        assert!(status.all_submitted());
        assert!(status.pending_powers().is_empty());
    }
}
