//! ---
//! gp_section: "01-core-functionality"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Shared primitives and utilities for the telemetry core."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
//! Core shared primitives for the GridPulse workspace.
//! This crate exposes tick-resolution time arithmetic, configuration
//! loading, and the tracing bootstrap consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{AlarmDefinition, AppConfig, CacheConfig, DispatchConfig, LoggingConfig};
pub use logging::{init_tracing, LogFormat};
pub use time::{
    datetime_from_ticks, now_ticks, seconds_to_ticks, ticks_from_datetime, ticks_to_seconds,
    TICKS_PER_SECOND,
};
