//! ---
//! gp_section: "06-alarm-monitoring"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Frame-driven alarm evaluation and state tracking."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use std::collections::HashMap;

use gridpulse_measure::{Measurement, MeasurementKey};

/// A timestamped bundle of measurements evaluated together by an alarm.
/// Frame production (concentration, alignment) is an upstream concern;
/// alarms only consume frames by reference.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    timestamp: i64,
    measurements: HashMap<MeasurementKey, Measurement>,
}

impl Frame {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            measurements: HashMap::new(),
        }
    }

    /// Timestamp of the frame in ticks since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Add a measurement, keyed by its own key. The later insert wins
    /// when the same key is added twice.
    pub fn insert(&mut self, measurement: Measurement) -> &mut Self {
        self.measurements
            .insert(measurement.key.clone(), measurement);
        self
    }

    pub fn measurement(&self, key: &MeasurementKey) -> Option<&Measurement> {
        self.measurements.get(key)
    }

    pub fn measurements(&self) -> impl Iterator<Item = &Measurement> {
        self.measurements.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &MeasurementKey> {
        self.measurements.keys()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridpulse_measure::StateFlags;

    #[test]
    fn later_insert_wins_for_the_same_key() {
        let key = MeasurementKey::new("pdc-east", 1);
        let mut frame = Frame::new(100);
        frame.insert(Measurement::new(key.clone(), 100, 1.0, StateFlags::NORMAL));
        frame.insert(Measurement::new(key.clone(), 100, 2.0, StateFlags::NORMAL));

        assert_eq!(frame.len(), 1);
        let stored = frame.measurement(&key).expect("measurement present");
        assert!((stored.value - 2.0).abs() < f64::EPSILON);
    }
}
