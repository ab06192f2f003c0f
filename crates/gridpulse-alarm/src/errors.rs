//! ---
//! gp_section: "06-alarm-monitoring"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Frame-driven alarm evaluation and state tracking."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use gridpulse_measure::MeasureError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AlarmError>;

#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("unrecognised alarm operation {0:?}")]
    UnknownOperation(String),
    #[error("unrecognised alarm combination {0:?}")]
    UnknownCombination(String),
    #[error("alarm {id}: invalid signal reference")]
    InvalidSignal {
        id: u64,
        #[source]
        source: MeasureError,
    },
    #[error("alarm {id}: operation requires {field}")]
    IncompleteDefinition { id: u64, field: &'static str },
}
