//! Configuration loading for the pod firmware workspace.
//!
//! Provides a standardized way to load the TOML configuration file shared
//! by every binary in the workspace.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{
    CALIBRATION_TIMEOUT_S, COMMS_BACKOFF_MAX_S, COMMS_BACKOFF_MIN_S, CYCLE_TIME_US,
    MIN_CALIBRATION_SAMPLES,
};

/// Log level for configuration (feeds `tracing_subscriber::EnvFilter`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    /// Render as the string `tracing_subscriber::EnvFilter` expects.
    pub const fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("configuration file not found")]
    FileNotFound,

    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Trait for loading configuration from TOML files.
///
/// Default implementation works for any `serde::de::DeserializeOwned` type.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Ground-station TCP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommsConfig {
    #[serde(default = "default_ground_station_addr")]
    pub ground_station_addr: String,
    #[serde(default = "default_backoff_min")]
    pub backoff_min_s: f64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_s: f64,
}

fn default_ground_station_addr() -> String {
    "127.0.0.1:7878".to_string()
}
fn default_backoff_min() -> f64 {
    COMMS_BACKOFF_MIN_S
}
fn default_backoff_max() -> f64 {
    COMMS_BACKOFF_MAX_S
}

impl Default for CommsConfig {
    fn default() -> Self {
        Self {
            ground_station_addr: default_ground_station_addr(),
            backoff_min_s: default_backoff_min(),
            backoff_max_s: default_backoff_max(),
        }
    }
}

/// Top-level configuration shared across all workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u64,

    #[serde(default = "default_min_calibration_samples")]
    pub min_calibration_samples: u64,

    #[serde(default = "default_calibration_timeout_s")]
    pub calibration_timeout_s: f64,

    #[serde(default)]
    pub comms: CommsConfig,
}

fn default_cycle_time_us() -> u64 {
    CYCLE_TIME_US
}
fn default_min_calibration_samples() -> u64 {
    MIN_CALIBRATION_SAMPLES
}
fn default_calibration_timeout_s() -> f64 {
    CALIBRATION_TIMEOUT_S
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            cycle_time_us: default_cycle_time_us(),
            min_calibration_samples: default_min_calibration_samples(),
            calibration_timeout_s: default_calibration_timeout_s(),
            comms: CommsConfig::default(),
        }
    }
}

impl PodConfig {
    /// Validate semantic constraints beyond what TOML deserialization checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_time_us == 0 {
            return Err(ConfigError::ValidationError(
                "cycle_time_us must be non-zero".to_string(),
            ));
        }
        if self.min_calibration_samples == 0 {
            return Err(ConfigError::ValidationError(
                "min_calibration_samples must be non-zero".to_string(),
            ));
        }
        if self.comms.backoff_min_s <= 0.0 || self.comms.backoff_min_s > self.comms.backoff_max_s {
            return Err(ConfigError::ValidationError(
                "comms.backoff_min_s must be positive and <= backoff_max_s".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_validates() {
        assert!(PodConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_cycle_time_rejected() {
        let mut cfg = PodConfig::default();
        cfg.cycle_time_us = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_backoff_rejected() {
        let mut cfg = PodConfig::default();
        cfg.comms.backoff_min_s = 10.0;
        cfg.comms.backoff_max_s = 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_missing_file_reports_not_found() {
        let result = PodConfig::load(Path::new("/nonexistent/pod.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn load_parses_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cycle_time_us = 2000\nlog_level = \"debug\"").unwrap();
        let cfg = PodConfig::load(file.path()).unwrap();
        assert_eq!(cfg.cycle_time_us, 2000);
        assert_eq!(cfg.log_level, LogLevel::Debug);
    }

    #[test]
    fn log_level_filter_strings() {
        assert_eq!(LogLevel::Debug.as_filter_str(), "debug");
        assert_eq!(LogLevel::Error.as_filter_str(), "error");
    }
}
