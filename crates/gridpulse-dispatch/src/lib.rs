//! ---
//! gp_section: "05-concurrency-dispatch"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Logical threads and the cooperative worker-pool scheduler."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
//! Cooperative dispatch for GridPulse.
//!
//! A [`LogicalThread`] is a unit of strictly-ordered, non-overlapping
//! execution: producers push actions onto its per-priority queues, and
//! the [`LogicalThreadScheduler`]'s worker pool drains ready threads
//! highest priority first, one action per scheduling pass. Because at
//! most one worker ever executes a given logical thread, state confined
//! to that thread's actions needs no locks: related mutation is
//! serialized by routing it through one logical thread instead.
//!
//! Actions are expected to be short and non-blocking; a long-running or
//! lock-heavy action degrades fairness for every logical thread sharing
//! the pool.

pub mod completion;
pub mod errors;
pub mod scheduler;
pub mod stats;
pub mod thread;

pub use completion::CompletionHandle;
pub use errors::{DispatchError, Result};
pub use scheduler::LogicalThreadScheduler;
pub use stats::ThreadStatistics;
pub use thread::{Action, LogicalThread};
