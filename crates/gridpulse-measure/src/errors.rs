//! ---
//! gp_section: "02-telemetry-data-model"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Measurement identity, temporal cells, and the latest-value cache."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MeasureError>;

#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("lag time must be greater than zero, got {0}")]
    NonPositiveLag(f64),
    #[error("lead time must be greater than zero, got {0}")]
    NonPositiveLead(f64),
    #[error("tag {0:?} is not registered")]
    UnknownTag(String),
    #[error("malformed measurement key {0:?}, expected source:id")]
    MalformedKey(String),
    #[error("unrecognised outlier operation {0:?}")]
    UnknownOutlierOperation(String),
}
