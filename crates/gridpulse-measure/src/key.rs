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
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MeasureError;

/// Immutable identifier for one physical signal.
///
/// Ordering is by source then id, which backs the sorted membership of
/// tag groups. The canonical text form is `source:id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeasurementKey {
    pub source: String,
    pub id: u64,
}

impl MeasurementKey {
    pub fn new(source: impl Into<String>, id: u64) -> Self {
        Self {
            source: source.into(),
            id,
        }
    }
}

impl fmt::Display for MeasurementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

impl FromStr for MeasurementKey {
    type Err = MeasureError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (source, id) = input
            .rsplit_once(':')
            .ok_or_else(|| MeasureError::MalformedKey(input.to_owned()))?;
        if source.is_empty() {
            return Err(MeasureError::MalformedKey(input.to_owned()));
        }
        let id = id
            .parse::<u64>()
            .map_err(|_| MeasureError::MalformedKey(input.to_owned()))?;
        Ok(Self::new(source, id))
    }
}
