//! ---
//! gp_section: "06-alarm-monitoring"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Frame-driven alarm evaluation and state tracking."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
//! Alarm evaluation for GridPulse.
//!
//! An [`Alarm`] is a per-signal-group state machine tested against
//! incoming measurement [`Frame`]s. Alarms carry no internal
//! synchronization; callers serialize [`Alarm::test`] per instance,
//! typically by running all alarm evaluation as actions on a single
//! logical thread.

pub mod alarm;
pub mod errors;
pub mod frame;

pub use alarm::{Alarm, AlarmCause, AlarmCombination, AlarmOperation, AlarmState};
pub use errors::{AlarmError, Result};
pub use frame::Frame;
