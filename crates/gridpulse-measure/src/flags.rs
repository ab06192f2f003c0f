//! ---
//! gp_section: "02-telemetry-data-model"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Measurement identity, temporal cells, and the latest-value cache."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Quality flags attached to a measurement value.
///
/// Serialized as the raw bit pattern so frames stay compact on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateFlags(u32);

impl StateFlags {
    pub const NORMAL: StateFlags = StateFlags(0);
    pub const BAD_DATA: StateFlags = StateFlags(1);
    pub const BAD_TIME: StateFlags = StateFlags(1 << 1);
    pub const SUSPECT_DATA: StateFlags = StateFlags(1 << 2);
    pub const OVER_RANGE_ERROR: StateFlags = StateFlags(1 << 3);
    pub const UNDER_RANGE_ERROR: StateFlags = StateFlags(1 << 4);
    pub const MEASUREMENT_ERROR: StateFlags = StateFlags(1 << 5);
    pub const CALCULATION_ERROR: StateFlags = StateFlags(1 << 6);

    pub const fn from_bits(bits: u32) -> Self {
        StateFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_normal(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: StateFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: StateFlags) {
        self.0 |= other.0;
    }
}

impl BitOr for StateFlags {
    type Output = StateFlags;

    fn bitor(self, rhs: StateFlags) -> StateFlags {
        StateFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for StateFlags {
    fn bitor_assign(&mut self, rhs: StateFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for StateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
