//! Static tables for the standard 1901 opening board.

use concord_domain::game::{Power, UnitKind};

/// Starting units: (power, kind, province).
pub const STARTING_UNITS: [(Power, UnitKind, &str); 22] = [
    (Power::England, UnitKind::Fleet, "EDI"),
    (Power::England, UnitKind::Fleet, "LON"),
    (Power::England, UnitKind::Army, "LVP"),
    (Power::France, UnitKind::Army, "PAR"),
    (Power::France, UnitKind::Army, "MAR"),
    (Power::France, UnitKind::Fleet, "BRE"),
    (Power::Germany, UnitKind::Army, "BER"),
    (Power::Germany, UnitKind::Army, "MUN"),
    (Power::Germany, UnitKind::Fleet, "KIE"),
    (Power::Italy, UnitKind::Army, "ROM"),
    (Power::Italy, UnitKind::Army, "VEN"),
    (Power::Italy, UnitKind::Fleet, "NAP"),
    (Power::Austria, UnitKind::Army, "VIE"),
    (Power::Austria, UnitKind::Army, "BUD"),
    (Power::Austria, UnitKind::Fleet, "TRI"),
    (Power::Russia, UnitKind::Army, "MOS"),
    (Power::Russia, UnitKind::Army, "WAR"),
    (Power::Russia, UnitKind::Fleet, "STP"),
    (Power::Russia, UnitKind::Fleet, "SEV"),
    (Power::Turkey, UnitKind::Army, "CON"),
    (Power::Turkey, UnitKind::Army, "SMY"),
    (Power::Turkey, UnitKind::Fleet, "ANK"),
];

/// Home supply centers, owned from the opening position.
pub const HOME_CENTERS: [(Power, &str); 22] = [
    (Power::England, "EDI"),
    (Power::England, "LON"),
    (Power::England, "LVP"),
    (Power::France, "PAR"),
    (Power::France, "MAR"),
    (Power::France, "BRE"),
    (Power::Germany, "BER"),
    (Power::Germany, "MUN"),
    (Power::Germany, "KIE"),
    (Power::Italy, "ROM"),
    (Power::Italy, "VEN"),
    (Power::Italy, "NAP"),
    (Power::Austria, "VIE"),
    (Power::Austria, "BUD"),
    (Power::Austria, "TRI"),
    (Power::Russia, "MOS"),
    (Power::Russia, "WAR"),
    (Power::Russia, "STP"),
    (Power::Russia, "SEV"),
    (Power::Turkey, "CON"),
    (Power::Turkey, "SMY"),
    (Power::Turkey, "ANK"),
];

/// Neutral supply centers, unowned at the start.
pub const NEUTRAL_CENTERS: [&str; 12] = [
    "BEL", "BUL", "DEN", "GRE", "HOL", "NWY", "POR", "RUM", "SER", "SPA", "SWE", "TUN",
];

/// Whether a province grants build capacity.
pub fn is_supply_center(province: &str) -> bool {
    HOME_CENTERS.iter().any(|(_, p)| *p == province)
        || NEUTRAL_CENTERS.contains(&province)
}
