//! ---
//! gp_section: "02-telemetry-data-model"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Measurement identity, temporal cells, and the latest-value cache."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
//! Measurement data model for GridPulse.
//!
//! Producers push `(key, timestamp, value, flags)` tuples into the
//! [`ImmediateMeasurements`] cache; any number of readers pull
//! time-adjusted values back out. Admission is strictly monotonic per
//! key, and values older than the lag window (or further ahead than the
//! lead window) are published according to the configured
//! [`OutlierOperation`].

pub mod cache;
pub mod errors;
pub mod flags;
pub mod key;
pub mod measurement;
pub mod temporal;

pub use cache::ImmediateMeasurements;
pub use errors::{MeasureError, Result};
pub use flags::StateFlags;
pub use key::MeasurementKey;
pub use measurement::Measurement;
pub use temporal::{OutlierOperation, TemporalMeasurement};
