//! ---
//! gp_section: "02-telemetry-data-model"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Measurement identity, temporal cells, and the latest-value cache."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::flags::StateFlags;
use crate::key::MeasurementKey;

/// One timestamped sample of a signal, as delivered by an acquisition
/// collaborator. Timestamps are ticks since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub key: MeasurementKey,
    pub value: f64,
    pub timestamp: i64,
    #[serde(default)]
    pub flags: StateFlags,
}

impl Measurement {
    pub fn new(key: MeasurementKey, timestamp: i64, value: f64, flags: StateFlags) -> Self {
        Self {
            key,
            value,
            timestamp,
            flags,
        }
    }

    /// Whether the sample carries a value consumers can trust.
    pub fn is_usable(&self) -> bool {
        self.value.is_finite() && !self.flags.contains(StateFlags::BAD_DATA)
    }
}
