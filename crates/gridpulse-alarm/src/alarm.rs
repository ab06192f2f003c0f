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
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gridpulse_common::config::AlarmDefinition;
use gridpulse_common::{datetime_from_ticks, seconds_to_ticks};
use gridpulse_measure::{Measurement, MeasurementKey};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::info;

use crate::errors::{AlarmError, Result};
use crate::frame::Frame;

/// Comparison applied per monitored signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlarmOperation {
    Equal,
    NotEqual,
    GreaterOrEqual,
    LessOrEqual,
    GreaterThan,
    LessThan,
    Flatline,
}

/// How per-signal results combine into one verdict for the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlarmCombination {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    #[default]
    Cleared,
    Raised,
}

/// Snapshot of the frame that raised an alarm.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmCause {
    pub timestamp: i64,
    pub values: Vec<(MeasurementKey, f64)>,
}

/// Per-signal-group alarm state machine.
///
/// `test` drives all transitions. The raise side uses the configured
/// combination directly (And = every monitored signal meets the
/// criteria, Or = any); the clear side uses its logical dual, so a
/// conjunctive alarm clears as soon as one constituent disagrees. Not
/// internally synchronized: callers must serialize `test` per instance.
#[derive(Debug, Clone)]
pub struct Alarm {
    id: u64,
    tag_name: String,
    description: Option<String>,
    signals: Vec<MeasurementKey>,
    operation: AlarmOperation,
    combination: AlarmCombination,
    set_point: Option<f64>,
    tolerance: Option<f64>,
    hysteresis: Option<f64>,
    delay_ticks: Option<i64>,
    timeout: Option<Duration>,
    state: AlarmState,
    time_raised: Option<i64>,
    cause: Option<AlarmCause>,
    last_values: HashMap<MeasurementKey, f64>,
    last_changed: HashMap<MeasurementKey, i64>,
    last_negative: Option<i64>,
}

impl Alarm {
    /// Build a runtime alarm from its declarative definition, failing
    /// fast on unknown operation/combination names, malformed signal
    /// references, and incomplete rule parameters.
    pub fn from_definition(definition: &AlarmDefinition) -> Result<Self> {
        let operation = AlarmOperation::from_str(&definition.operation)
            .map_err(|_| AlarmError::UnknownOperation(definition.operation.clone()))?;
        let combination = AlarmCombination::from_str(&definition.combination)
            .map_err(|_| AlarmError::UnknownCombination(definition.combination.clone()))?;
        let signals = definition
            .signals
            .iter()
            .map(|raw| {
                raw.parse::<MeasurementKey>()
                    .map_err(|source| AlarmError::InvalidSignal {
                        id: definition.id,
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        validate_rule(
            definition.id,
            operation,
            definition.set_point,
            definition.tolerance,
            definition.delay,
        )?;

        Ok(Self {
            id: definition.id,
            tag_name: definition.tag_name.clone(),
            description: definition.description.clone(),
            signals,
            operation,
            combination,
            set_point: definition.set_point,
            tolerance: definition.tolerance,
            hysteresis: definition.hysteresis,
            delay_ticks: definition
                .delay
                .map(|delay| seconds_to_ticks(delay.as_secs_f64())),
            timeout: definition.timeout,
            state: AlarmState::Cleared,
            time_raised: None,
            cause: None,
            last_values: HashMap::new(),
            last_changed: HashMap::new(),
            last_negative: None,
        })
    }

    /// Evaluate one frame. Returns whether the alarm changed state.
    pub fn test(&mut self, frame: &Frame) -> bool {
        let monitored = self.monitored(frame);

        // Flatline tracking advances on every frame regardless of state,
        // so dwell measurement survives raise/clear transitions.
        let flatline = if self.operation == AlarmOperation::Flatline {
            Some(self.advance_flatline(&monitored, frame.timestamp()))
        } else {
            None
        };

        match self.state {
            AlarmState::Cleared => {
                let satisfied = match &flatline {
                    Some(tracked) => {
                        self.combine_raise(tracked.iter().map(|signal| signal.flatlined))
                    }
                    None => {
                        let combined = self
                            .combine_raise(monitored.iter().map(|m| self.raise_predicate(m.value)));
                        self.damp(combined, frame.timestamp())
                    }
                };
                if !satisfied {
                    return false;
                }
                self.state = AlarmState::Raised;
                self.time_raised = Some(frame.timestamp());
                self.cause = Some(AlarmCause {
                    timestamp: frame.timestamp(),
                    values: monitored
                        .iter()
                        .map(|m| (m.key.clone(), m.value))
                        .collect(),
                });
                info!(
                    alarm = self.id,
                    tag = %self.tag_name,
                    timestamp = frame.timestamp(),
                    operation = %self.operation,
                    "alarm raised"
                );
                true
            }
            AlarmState::Raised => {
                let satisfied = match &flatline {
                    Some(tracked) => {
                        self.combine_clear(tracked.iter().map(|signal| signal.changed))
                    }
                    None => {
                        self.combine_clear(monitored.iter().map(|m| self.clear_predicate(m.value)))
                    }
                };
                if !satisfied {
                    return false;
                }
                self.state = AlarmState::Cleared;
                self.last_negative = None;
                info!(
                    alarm = self.id,
                    tag = %self.tag_name,
                    timestamp = frame.timestamp(),
                    "alarm cleared"
                );
                true
            }
        }
    }

    /// Replace the comparison operation, revalidating the rule
    /// parameters against it.
    pub fn set_operation(&mut self, operation: AlarmOperation) -> Result<()> {
        validate_rule(
            self.id,
            operation,
            self.set_point,
            self.tolerance,
            self.delay_ticks.map(ticks_to_duration),
        )?;
        self.operation = operation;
        Ok(())
    }

    /// Replace the combination policy.
    pub fn set_combination(&mut self, combination: AlarmCombination) {
        self.combination = combination;
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn signals(&self) -> &[MeasurementKey] {
        &self.signals
    }

    pub fn operation(&self) -> AlarmOperation {
        self.operation
    }

    pub fn combination(&self) -> AlarmCombination {
        self.combination
    }

    pub fn set_point(&self) -> Option<f64> {
        self.set_point
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn is_raised(&self) -> bool {
        self.state == AlarmState::Raised
    }

    /// Tick timestamp of the raising frame; set on Cleared→Raised only.
    pub fn time_raised(&self) -> Option<i64> {
        self.time_raised
    }

    pub fn time_raised_utc(&self) -> Option<DateTime<Utc>> {
        self.time_raised.and_then(datetime_from_ticks)
    }

    pub fn cause(&self) -> Option<&AlarmCause> {
        self.cause.as_ref()
    }

    /// Monitored measurements present in the frame. An empty signal list
    /// monitors every measurement the frame carries.
    fn monitored<'frame>(&self, frame: &'frame Frame) -> Vec<&'frame Measurement> {
        if self.signals.is_empty() {
            frame.measurements().collect()
        } else {
            self.signals
                .iter()
                .filter_map(|key| frame.measurement(key))
                .collect()
        }
    }

    /// All configured signals must be observed for a conjunctive raise;
    /// absent signals never satisfy a predicate.
    fn expected_signal_count(&self, observed: usize) -> usize {
        if self.signals.is_empty() {
            observed
        } else {
            self.signals.len()
        }
    }

    fn combine_raise(&self, results: impl Iterator<Item = bool>) -> bool {
        let mut observed = 0usize;
        let mut satisfied = 0usize;
        for result in results {
            observed += 1;
            if result {
                satisfied += 1;
            }
        }
        match self.combination {
            AlarmCombination::And => {
                observed > 0 && satisfied == self.expected_signal_count(observed)
            }
            AlarmCombination::Or => satisfied > 0,
        }
    }

    /// Clearing combines with the dual of the configured policy: an
    /// And-configured alarm clears when any signal clears, an
    /// Or-configured alarm only when all of them do.
    fn combine_clear(&self, results: impl Iterator<Item = bool>) -> bool {
        let mut observed = 0usize;
        let mut satisfied = 0usize;
        for result in results {
            observed += 1;
            if result {
                satisfied += 1;
            }
        }
        match self.combination {
            AlarmCombination::And => satisfied > 0,
            AlarmCombination::Or => observed > 0 && satisfied == self.expected_signal_count(observed),
        }
    }

    fn raise_predicate(&self, value: f64) -> bool {
        let set_point = self.set_point.unwrap_or_default();
        match self.operation {
            AlarmOperation::Equal => {
                (value - set_point).abs() <= self.tolerance.unwrap_or_default()
            }
            AlarmOperation::NotEqual => {
                (value - set_point).abs() > self.tolerance.unwrap_or_default()
            }
            AlarmOperation::GreaterOrEqual => value >= set_point,
            AlarmOperation::LessOrEqual => value <= set_point,
            AlarmOperation::GreaterThan => value > set_point,
            AlarmOperation::LessThan => value < set_point,
            AlarmOperation::Flatline => false,
        }
    }

    fn clear_predicate(&self, value: f64) -> bool {
        let set_point = self.set_point.unwrap_or_default();
        let hysteresis = self.hysteresis.unwrap_or_default();
        match self.operation {
            AlarmOperation::Equal => {
                (value - set_point).abs() > self.tolerance.unwrap_or_default()
            }
            AlarmOperation::NotEqual => {
                (value - set_point).abs() <= self.tolerance.unwrap_or_default()
            }
            AlarmOperation::GreaterOrEqual => value < set_point - hysteresis,
            AlarmOperation::LessOrEqual => value > set_point + hysteresis,
            AlarmOperation::GreaterThan => value <= set_point - hysteresis,
            AlarmOperation::LessThan => value >= set_point + hysteresis,
            AlarmOperation::Flatline => false,
        }
    }

    /// Require the raise condition to hold continuously for the
    /// configured delay. Any failing frame restarts the dwell window,
    /// and the first positive observation only anchors it.
    fn damp(&mut self, satisfied: bool, timestamp: i64) -> bool {
        let Some(delay) = self.delay_ticks else {
            return satisfied;
        };
        if !satisfied {
            self.last_negative = Some(timestamp);
            return false;
        }
        match self.last_negative {
            None => {
                self.last_negative = Some(timestamp);
                false
            }
            Some(anchor) => timestamp.saturating_sub(anchor) >= delay,
        }
    }

    fn advance_flatline(
        &mut self,
        monitored: &[&Measurement],
        timestamp: i64,
    ) -> Vec<FlatlineSignal> {
        let delay = self.delay_ticks.unwrap_or(i64::MAX);
        monitored
            .iter()
            .map(|m| {
                let changed = match self.last_values.get(&m.key) {
                    // NaN never compares equal, so a NaN stream reads as
                    // continuously changing and cannot flatline.
                    Some(previous) => *previous != m.value,
                    None => true,
                };
                if changed {
                    self.last_values.insert(m.key.clone(), m.value);
                    self.last_changed.insert(m.key.clone(), timestamp);
                }
                let since_change = timestamp
                    .saturating_sub(self.last_changed.get(&m.key).copied().unwrap_or(timestamp));
                FlatlineSignal {
                    changed,
                    flatlined: since_change >= delay,
                }
            })
            .collect()
    }
}

struct FlatlineSignal {
    changed: bool,
    flatlined: bool,
}

fn ticks_to_duration(ticks: i64) -> Duration {
    Duration::from_secs_f64(gridpulse_common::ticks_to_seconds(ticks.max(0)))
}

fn validate_rule(
    id: u64,
    operation: AlarmOperation,
    set_point: Option<f64>,
    tolerance: Option<f64>,
    delay: Option<Duration>,
) -> Result<()> {
    match operation {
        AlarmOperation::Equal | AlarmOperation::NotEqual => {
            if set_point.is_none() {
                return Err(AlarmError::IncompleteDefinition {
                    id,
                    field: "set_point",
                });
            }
            if tolerance.is_none() {
                return Err(AlarmError::IncompleteDefinition {
                    id,
                    field: "tolerance",
                });
            }
        }
        AlarmOperation::GreaterOrEqual
        | AlarmOperation::LessOrEqual
        | AlarmOperation::GreaterThan
        | AlarmOperation::LessThan => {
            if set_point.is_none() {
                return Err(AlarmError::IncompleteDefinition {
                    id,
                    field: "set_point",
                });
            }
        }
        AlarmOperation::Flatline => {
            if delay.is_none() {
                return Err(AlarmError::IncompleteDefinition { id, field: "delay" });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_and_combination_parse_from_config_strings() {
        assert_eq!(
            "greater_or_equal".parse::<AlarmOperation>().unwrap(),
            AlarmOperation::GreaterOrEqual
        );
        assert_eq!("or".parse::<AlarmCombination>().unwrap(), AlarmCombination::Or);
        assert!("sometimes".parse::<AlarmCombination>().is_err());
    }

    #[test]
    fn incomplete_rules_fail_at_construction() {
        let definition = AlarmDefinition {
            id: 3,
            tag_name: "BUS1:FREQ".into(),
            description: None,
            signals: vec!["pdc-east:1".into()],
            operation: "equal".into(),
            combination: "and".into(),
            set_point: Some(60.0),
            tolerance: None,
            delay: None,
            hysteresis: None,
            timeout: None,
        };
        match Alarm::from_definition(&definition) {
            Err(AlarmError::IncompleteDefinition { id: 3, field }) => {
                assert_eq!(field, "tolerance");
            }
            other => panic!("expected incomplete definition, got {other:?}"),
        }
    }

    #[test]
    fn unknown_operation_fails_at_construction() {
        let definition = AlarmDefinition {
            id: 4,
            tag_name: "BUS1:FREQ".into(),
            description: None,
            signals: Vec::new(),
            operation: "approximately".into(),
            combination: "and".into(),
            set_point: Some(60.0),
            tolerance: Some(0.1),
            delay: None,
            hysteresis: None,
            timeout: None,
        };
        assert!(matches!(
            Alarm::from_definition(&definition),
            Err(AlarmError::UnknownOperation(_))
        ));
    }

    #[test]
    fn malformed_signal_reference_fails_at_construction() {
        let definition = AlarmDefinition {
            id: 5,
            tag_name: "BUS1:FREQ".into(),
            description: None,
            signals: vec!["not a key".into()],
            operation: "greater_than".into(),
            combination: "or".into(),
            set_point: Some(60.0),
            tolerance: None,
            delay: None,
            hysteresis: None,
            timeout: None,
        };
        assert!(matches!(
            Alarm::from_definition(&definition),
            Err(AlarmError::InvalidSignal { id: 5, .. })
        ));
    }
}
