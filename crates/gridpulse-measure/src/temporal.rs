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
use strum::{Display, EnumString};

use crate::flags::StateFlags;

/// How a value outside its lag/lead window is published to readers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutlierOperation {
    /// Replace the stale value with NaN.
    #[default]
    PublishValueAsNan,
    /// Publish the stored value but OR the outlier flags into its state.
    PublishWithBadState,
    /// Suppress publication; numeric readers observe NaN.
    DoNotPublish,
    /// Publish the stored value untouched.
    PublishValueAsIs,
}

/// A single mutable time-stamped value cell.
///
/// Cells are owned by [`ImmediateMeasurements`](crate::ImmediateMeasurements)
/// and mutated in place. Admission is strictly monotonic: a write with a
/// timestamp at or before the stored one is dropped, so out-of-order
/// network data can never overwrite fresher data.
#[derive(Debug, Clone)]
pub struct TemporalMeasurement {
    value: f64,
    timestamp: i64,
    flags: StateFlags,
    lag_ticks: i64,
    lead_ticks: i64,
    outlier_operation: OutlierOperation,
    outlier_flags: StateFlags,
}

impl TemporalMeasurement {
    pub fn new(lag_ticks: i64, lead_ticks: i64, outlier_operation: OutlierOperation) -> Self {
        Self {
            value: f64::NAN,
            timestamp: i64::MIN,
            flags: StateFlags::NORMAL,
            lag_ticks,
            lead_ticks,
            outlier_operation,
            outlier_flags: StateFlags::BAD_TIME | StateFlags::SUSPECT_DATA,
        }
    }

    /// Store a new sample iff its timestamp is strictly newer than the
    /// stored one. Returns whether the store occurred; rejection is the
    /// defined admission policy, not an error.
    pub fn set_value(&mut self, timestamp: i64, value: f64, flags: StateFlags) -> bool {
        if timestamp <= self.timestamp {
            return false;
        }
        self.timestamp = timestamp;
        self.value = value;
        self.flags = flags;
        true
    }

    /// Read the stored value as seen at `current_ticks`, applying the
    /// outlier policy when the sample falls outside the lag/lead window.
    pub fn adjusted_value(&mut self, current_ticks: i64) -> f64 {
        let age = current_ticks.saturating_sub(self.timestamp);
        let skew = self.timestamp.saturating_sub(current_ticks);
        if age <= self.lag_ticks && skew <= self.lead_ticks {
            return self.value;
        }
        match self.outlier_operation {
            OutlierOperation::PublishValueAsNan | OutlierOperation::DoNotPublish => f64::NAN,
            OutlierOperation::PublishWithBadState => {
                self.flags.insert(self.outlier_flags);
                self.value
            }
            OutlierOperation::PublishValueAsIs => self.value,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn flags(&self) -> StateFlags {
        self.flags
    }

    pub fn lag_ticks(&self) -> i64 {
        self.lag_ticks
    }

    pub fn lead_ticks(&self) -> i64 {
        self.lead_ticks
    }

    pub fn outlier_operation(&self) -> OutlierOperation {
        self.outlier_operation
    }

    // Lag/lead positivity is enforced at the cache boundary; these setters
    // exist for the cache-level broadcast.
    pub(crate) fn set_lag_ticks(&mut self, lag_ticks: i64) {
        self.lag_ticks = lag_ticks;
    }

    pub(crate) fn set_lead_ticks(&mut self, lead_ticks: i64) {
        self.lead_ticks = lead_ticks;
    }

    pub(crate) fn set_outlier_operation(&mut self, operation: OutlierOperation) {
        self.outlier_operation = operation;
    }

    /// Flags ORed into the stored state when publishing with bad state.
    pub fn set_outlier_flags(&mut self, flags: StateFlags) {
        self.outlier_flags = flags;
    }
}
