//! ---
//! gp_section: "01-core-functionality"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Shared primitives and utilities for the telemetry core."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use tracing::debug;

use crate::logging::LogFormat;

fn default_priority_levels() -> usize {
    3
}

fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(4)
}

fn default_lag_time() -> f64 {
    10.0
}

fn default_lead_time() -> f64 {
    5.0
}

fn default_outlier_operation() -> String {
    "publish_value_as_nan".to_owned()
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the GridPulse runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub alarms: Vec<AlarmDefinition>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "GRIDPULSE_CONFIG";

    /// Load configuration from disk, respecting the `GRIDPULSE_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                return Self::from_path(PathBuf::from(env_path));
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                return Self::from_path(candidate.as_ref().to_path_buf());
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let config: AppConfig = match extension {
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("failed to parse config file {}", path.display()))?,
            _ => toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file {}", path.display()))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants across all sections.
    pub fn validate(&self) -> Result<()> {
        self.dispatch.validate()?;
        self.cache.validate()?;
        for alarm in &self.alarms {
            alarm.validate()?;
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Sizing knobs for the logical-thread scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Number of distinct action priorities, lowest urgency is 1.
    #[serde(default = "default_priority_levels")]
    pub priority_levels: usize,
    /// Upper bound on physical worker threads draining logical threads.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.priority_levels == 0 {
            return Err(anyhow!("dispatch.priority_levels must be at least 1"));
        }
        if self.max_workers == 0 {
            return Err(anyhow!("dispatch.max_workers must be at least 1"));
        }
        Ok(())
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            priority_levels: default_priority_levels(),
            max_workers: default_max_workers(),
        }
    }
}

/// Time-window admission settings for the latest-value cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Tolerated data age in seconds before a value is an outlier.
    #[serde(default = "default_lag_time")]
    pub lag_time: f64,
    /// Tolerated future skew in seconds before a value is an outlier.
    #[serde(default = "default_lead_time")]
    pub lead_time: f64,
    /// Outlier policy name, parsed by the measurement crate.
    #[serde(default = "default_outlier_operation")]
    pub outlier_operation: String,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lag_time <= 0.0 {
            return Err(anyhow!("cache.lag_time must be greater than zero"));
        }
        if self.lead_time <= 0.0 {
            return Err(anyhow!("cache.lead_time must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lag_time: default_lag_time(),
            lead_time: default_lead_time(),
            outlier_operation: default_outlier_operation(),
        }
    }
}

/// Declarative alarm rule consumed by the alarm crate.
///
/// `operation` and `combination` are kept as strings here so the shared
/// crate stays free of alarm-domain types; they are parsed and validated
/// when the runtime alarm is constructed. `signals` entries use the
/// `source:id` measurement key notation.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmDefinition {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub signals: Vec<String>,
    pub operation: String,
    pub combination: String,
    #[serde(default)]
    pub set_point: Option<f64>,
    #[serde(default)]
    pub tolerance: Option<f64>,
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    #[serde(default)]
    pub delay: Option<Duration>,
    #[serde(default)]
    pub hysteresis: Option<f64>,
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl AlarmDefinition {
    /// Structural checks that do not require alarm-domain knowledge.
    pub fn validate(&self) -> Result<()> {
        if self.tag_name.trim().is_empty() {
            return Err(anyhow!("alarm {} is missing a tag name", self.id));
        }
        if self.operation.trim().is_empty() {
            return Err(anyhow!("alarm {} is missing an operation", self.id));
        }
        if self.combination.trim().is_empty() {
            return Err(anyhow!("alarm {} is missing a combination", self.id));
        }
        if let Some(tolerance) = self.tolerance {
            if tolerance < 0.0 {
                return Err(anyhow!("alarm {} tolerance cannot be negative", self.id));
            }
        }
        if let Some(hysteresis) = self.hysteresis {
            if hysteresis < 0.0 {
                return Err(anyhow!("alarm {} hysteresis cannot be negative", self.id));
            }
        }
        Ok(())
    }
}

/// Logging sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub file_prefix: Option<String>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            file_prefix: None,
            format: default_log_format(),
        }
    }
}
