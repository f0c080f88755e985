//! Order types submitted by agents, one family per phase.

use serde::{Deserialize, Serialize};

use crate::game::{Province, UnitKind};

/// A movement-phase order for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MovementOrder {
    Hold {
        province: Province,
    },
    Move {
        from: Province,
        to: Province,
    },
    /// Support adds strength to another unit's hold or move. The simplified
    /// in-process engine records supports but adjudicates them as holds;
    /// a full adjudicator honors them.
    Support {
        province: Province,
        target: Province,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<Province>,
    },
}

impl MovementOrder {
    /// The province of the unit this order belongs to.
    pub fn unit_province(&self) -> &Province {
        match self {
            MovementOrder::Hold { province } => province,
            MovementOrder::Move { from, .. } => from,
            MovementOrder::Support { province, .. } => province,
        }
    }

    pub fn hold(province: impl Into<Province>) -> Self {
        MovementOrder::Hold {
            province: province.into(),
        }
    }

    pub fn mv(from: impl Into<Province>, to: impl Into<Province>) -> Self {
        MovementOrder::Move {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// A retreat order for one dislodged unit. `destination = None` disbands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetreatOrder {
    pub province: Province,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Province>,
}

impl RetreatOrder {
    pub fn disband(province: impl Into<Province>) -> Self {
        Self {
            province: province.into(),
            destination: None,
        }
    }
}

/// A build-phase adjustment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BuildOrder {
    Build { province: Province, kind: UnitKind },
    Disband { province: Province },
    /// Give up a build the power is owed.
    Waive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_order_unit_province() {
        assert_eq!(MovementOrder::hold("PAR").unit_province(), "PAR");
        assert_eq!(MovementOrder::mv("PAR", "BUR").unit_province(), "PAR");
    }

    #[test]
    fn order_json_shape_is_tagged() {
        let json = serde_json::to_value(MovementOrder::mv("KIE", "DEN")).unwrap();
        assert_eq!(json["action"], "move");
        assert_eq!(json["from"], "KIE");
        assert_eq!(json["to"], "DEN");

        let json = serde_json::to_value(BuildOrder::Waive).unwrap();
        assert_eq!(json["action"], "waive");
    }

    #[test]
    fn retreat_disband_omits_destination() {
        let json = serde_json::to_value(RetreatOrder::disband("BER")).unwrap();
        assert!(json.get("destination").is_none());
    }
}
