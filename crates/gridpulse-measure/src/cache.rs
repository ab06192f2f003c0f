//! ---
//! gp_section: "02-telemetry-data-model"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Measurement identity, temporal cells, and the latest-value cache."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use gridpulse_common::config::CacheConfig;
use gridpulse_common::seconds_to_ticks;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::errors::{MeasureError, Result};
use crate::key::MeasurementKey;
use crate::measurement::Measurement;
use crate::temporal::{OutlierOperation, TemporalMeasurement};

#[derive(Debug, Clone, Copy)]
struct CacheSettings {
    lag_time: f64,
    lead_time: f64,
    outlier_operation: OutlierOperation,
}

/// Latest-value cache: one [`TemporalMeasurement`] cell per key, plus
/// tag-grouped aggregation.
///
/// Safe for unsynchronized concurrent use: the key map is guarded by a
/// read/write lock with get-or-create semantics (at most one cell is ever
/// created per key, racing creators converge on the same cell), and each
/// cell carries its own mutex so adjusted reads can mark bad state in
/// place. Entries are never removed individually; [`clear`](Self::clear)
/// is the only teardown.
#[derive(Debug)]
pub struct ImmediateMeasurements {
    cells: RwLock<HashMap<MeasurementKey, Arc<Mutex<TemporalMeasurement>>>>,
    tags: RwLock<IndexMap<String, Vec<MeasurementKey>>>,
    settings: Mutex<CacheSettings>,
}

impl ImmediateMeasurements {
    /// Construct with explicit lag/lead windows in seconds.
    pub fn new(lag_time: f64, lead_time: f64) -> Result<Self> {
        if lag_time <= 0.0 {
            return Err(MeasureError::NonPositiveLag(lag_time));
        }
        if lead_time <= 0.0 {
            return Err(MeasureError::NonPositiveLead(lead_time));
        }
        Ok(Self {
            cells: RwLock::new(HashMap::new()),
            tags: RwLock::new(IndexMap::new()),
            settings: Mutex::new(CacheSettings {
                lag_time,
                lead_time,
                outlier_operation: OutlierOperation::default(),
            }),
        })
    }

    /// Construct from the shared configuration section.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let cache = Self::new(config.lag_time, config.lead_time)?;
        let operation = OutlierOperation::from_str(&config.outlier_operation)
            .map_err(|_| MeasureError::UnknownOutlierOperation(config.outlier_operation.clone()))?;
        cache.set_outlier_operation(operation);
        Ok(cache)
    }

    /// Get-or-create the cell for `key`. Concurrent callers for the same
    /// unseen key all observe the identical cell.
    pub fn measurement(&self, key: &MeasurementKey) -> Arc<Mutex<TemporalMeasurement>> {
        if let Some(cell) = self.cells.read().get(key) {
            return cell.clone();
        }
        let mut cells = self.cells.write();
        cells
            .entry(key.clone())
            .or_insert_with(|| {
                let settings = *self.settings.lock();
                debug!(key = %key, "created measurement cell");
                Arc::new(Mutex::new(TemporalMeasurement::new(
                    seconds_to_ticks(settings.lag_time),
                    seconds_to_ticks(settings.lead_time),
                    settings.outlier_operation,
                )))
            })
            .clone()
    }

    /// Resolve the cell for the sample's key and apply the monotonic
    /// admission gate. Returns whether the value was stored.
    pub fn update(&self, sample: &Measurement) -> bool {
        let cell = self.measurement(&sample.key);
        let stored = cell
            .lock()
            .set_value(sample.timestamp, sample.value, sample.flags);
        if !stored {
            debug!(key = %sample.key, timestamp = sample.timestamp, "dropped out-of-order sample");
        }
        stored
    }

    /// Time-adjusted read for `key` as seen at `now_ticks`, creating the
    /// cell on first reference.
    pub fn adjusted_value(&self, key: &MeasurementKey, now_ticks: i64) -> f64 {
        self.measurement(key).lock().adjusted_value(now_ticks)
    }

    pub fn lag_time(&self) -> f64 {
        self.settings.lock().lag_time
    }

    pub fn lead_time(&self) -> f64 {
        self.settings.lock().lead_time
    }

    /// Set the lag window and synchronously push it to every existing cell.
    pub fn set_lag_time(&self, lag_time: f64) -> Result<()> {
        if lag_time <= 0.0 {
            return Err(MeasureError::NonPositiveLag(lag_time));
        }
        self.settings.lock().lag_time = lag_time;
        let lag_ticks = seconds_to_ticks(lag_time);
        for cell in self.cells.read().values() {
            cell.lock().set_lag_ticks(lag_ticks);
        }
        Ok(())
    }

    /// Set the lead window and synchronously push it to every existing cell.
    pub fn set_lead_time(&self, lead_time: f64) -> Result<()> {
        if lead_time <= 0.0 {
            return Err(MeasureError::NonPositiveLead(lead_time));
        }
        self.settings.lock().lead_time = lead_time;
        let lead_ticks = seconds_to_ticks(lead_time);
        for cell in self.cells.read().values() {
            cell.lock().set_lead_ticks(lead_ticks);
        }
        Ok(())
    }

    /// Set the outlier policy for new and existing cells.
    pub fn set_outlier_operation(&self, operation: OutlierOperation) {
        self.settings.lock().outlier_operation = operation;
        for cell in self.cells.read().values() {
            cell.lock().set_outlier_operation(operation);
        }
    }

    /// Idempotent tag membership: binary-search for the key, skip when
    /// present, otherwise insert and re-sort.
    pub fn add_tagged_measurement(&self, tag: impl Into<String>, key: MeasurementKey) {
        let tag = tag.into();
        let mut tags = self.tags.write();
        let members = tags.entry(tag).or_default();
        if members.binary_search(&key).is_err() {
            members.push(key);
            members.sort();
        }
    }

    /// Sorted member keys of `tag`; unknown tags are an error, there is no
    /// implicit empty-group fallback.
    pub fn tagged_keys(&self, tag: &str) -> Result<Vec<MeasurementKey>> {
        self.tags
            .read()
            .get(tag)
            .cloned()
            .ok_or_else(|| MeasureError::UnknownTag(tag.to_owned()))
    }

    /// All registered tags, in registration order.
    pub fn tags(&self) -> Vec<String> {
        self.tags.read().keys().cloned().collect()
    }

    /// Minimum adjusted value across all cells at `now_ticks`, skipping
    /// NaN. An empty or all-NaN set yields `f64::MAX`.
    pub fn minimum(&self, now_ticks: i64) -> f64 {
        let cells: Vec<_> = self.cells.read().values().cloned().collect();
        fold_minimum(cells.iter().map(|cell| cell.lock().adjusted_value(now_ticks)))
    }

    /// Maximum adjusted value across all cells at `now_ticks`, skipping
    /// NaN. An empty or all-NaN set yields `f64::MIN`.
    pub fn maximum(&self, now_ticks: i64) -> f64 {
        let cells: Vec<_> = self.cells.read().values().cloned().collect();
        fold_maximum(cells.iter().map(|cell| cell.lock().adjusted_value(now_ticks)))
    }

    /// Average adjusted value across all cells at `now_ticks`, skipping
    /// NaN. An empty or all-NaN set yields NaN.
    pub fn average(&self, now_ticks: i64) -> f64 {
        let cells: Vec<_> = self.cells.read().values().cloned().collect();
        fold_average(cells.iter().map(|cell| cell.lock().adjusted_value(now_ticks)))
    }

    /// Tag-scoped minimum; see [`minimum`](Self::minimum).
    pub fn tag_minimum(&self, tag: &str, now_ticks: i64) -> Result<f64> {
        let keys = self.tagged_keys(tag)?;
        Ok(fold_minimum(
            keys.iter().map(|key| self.adjusted_value(key, now_ticks)),
        ))
    }

    /// Tag-scoped maximum; see [`maximum`](Self::maximum).
    pub fn tag_maximum(&self, tag: &str, now_ticks: i64) -> Result<f64> {
        let keys = self.tagged_keys(tag)?;
        Ok(fold_maximum(
            keys.iter().map(|key| self.adjusted_value(key, now_ticks)),
        ))
    }

    /// Tag-scoped average; see [`average`](Self::average).
    pub fn tag_average(&self, tag: &str, now_ticks: i64) -> Result<f64> {
        let keys = self.tagged_keys(tag)?;
        Ok(fold_average(
            keys.iter().map(|key| self.adjusted_value(key, now_ticks)),
        ))
    }

    /// Drop every cell and tag group. This is the explicit teardown; cells
    /// are never removed individually.
    pub fn clear(&self) {
        self.cells.write().clear();
        self.tags.write().clear();
    }

    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }
}

impl Default for ImmediateMeasurements {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default()).expect("default cache config is valid")
    }
}

fn fold_minimum(values: impl Iterator<Item = f64>) -> f64 {
    values
        .filter(|value| !value.is_nan())
        .fold(f64::MAX, f64::min)
}

fn fold_maximum(values: impl Iterator<Item = f64>) -> f64 {
    values
        .filter(|value| !value.is_nan())
        .fold(f64::MIN, f64::max)
}

fn fold_average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|value| !value.is_nan())
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
