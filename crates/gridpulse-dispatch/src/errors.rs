//! ---
//! gp_section: "05-concurrency-dispatch"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Logical threads and the cooperative worker-pool scheduler."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("priority {priority} is outside the valid range 1..={levels}")]
    InvalidPriority { priority: usize, levels: usize },
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfiguration(String),
    #[error("scheduler is shut down")]
    SchedulerShutdown,
    #[error("failed to spawn dispatch worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
    #[error("action failed: {0}")]
    ActionFailed(String),
    #[error("action was discarded before it could run")]
    ActionDropped,
}
