//! Library configuration using Figment
//!
//! Configuration is loaded from:
//! 1. built-in defaults (no file is required)
//! 2. a TOML file (`config/uldaq.toml` unless a path is given)
//! 3. environment variables prefixed with `ULDAQ_`
//!
//! # Example
//! ```no_run
//! use uldaq::config::UlConfig;
//!
//! let config = UlConfig::load()?;
//! println!("bulk timeout: {} ms", config.transfer.bulk_timeout_ms);
//! # Ok::<(), uldaq::UlError>(())
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, UlError};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/uldaq.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UlConfig {
    /// USB transfer tuning
    pub transfer: TransferConfig,
    /// Background scan behaviour
    pub scan: ScanConfig,
    /// Logging output
    pub logging: LoggingSection,
}

/// USB transfer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Timeout for one control transfer (send/query command)
    pub command_timeout_ms: u64,
    /// Timeout for one bulk stage before the worker polls hardware status
    pub bulk_timeout_ms: u64,
    /// Target duration of one bulk stage in seconds
    pub stage_rate_secs: f64,
    /// Upper bound for one bulk stage in bytes
    pub max_stage_size: usize,
    /// Number of stage buffers cycled by the transfer worker
    pub transfer_count: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 1000,
            bulk_timeout_ms: 100,
            stage_rate_secs: 0.01,
            max_stage_size: 256 * 1024,
            transfer_count: 8,
        }
    }
}

impl TransferConfig {
    /// Control transfer timeout as a duration.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Bulk stage timeout as a duration.
    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_millis(self.bulk_timeout_ms)
    }
}

/// Background scan settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Sleep between status polls inside `wait`
    pub wait_poll_interval_ms: u64,
    /// Minimum scan time between two cold-junction refreshes
    pub cjc_refresh_secs: f64,
    /// Rate (per channel) below which the default transfer mode is single-IO.
    /// Zero disables the rule.
    pub single_io_rate_threshold: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            wait_poll_interval_ms: 1,
            cjc_refresh_secs: 0.01,
            single_io_rate_threshold: 0.0,
        }
    }
}

impl ScanConfig {
    /// Poll interval as a duration.
    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms.max(1))
    }
}

/// Logging section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Logging level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (pretty, compact, json)
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

impl UlConfig {
    /// Load configuration from `config/uldaq.toml` and environment variables.
    ///
    /// Environment variables override file values with prefix `ULDAQ_`,
    /// e.g. `ULDAQ_TRANSFER__BULK_TIMEOUT_MS=250`.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and the environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ULDAQ_").split("__"))
            .extract()
            .map_err(|e| {
                warn!(error = %e, "Failed to load configuration");
                UlError::BadConfigVal
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the library cannot run with.
    pub fn validate(&self) -> Result<()> {
        let transfer = &self.transfer;
        if transfer.command_timeout_ms == 0 || transfer.bulk_timeout_ms == 0 {
            return Err(UlError::BadConfigVal);
        }
        if transfer.transfer_count == 0 || transfer.max_stage_size == 0 {
            return Err(UlError::BadConfigVal);
        }
        if !(transfer.stage_rate_secs.is_finite() && transfer.stage_rate_secs > 0.0) {
            return Err(UlError::BadConfigVal);
        }
        if !(self.scan.cjc_refresh_secs.is_finite() && self.scan.cjc_refresh_secs >= 0.0) {
            return Err(UlError::BadConfigVal);
        }
        if !(self.scan.single_io_rate_threshold >= 0.0) {
            return Err(UlError::BadConfigVal);
        }
        if !VALID_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(UlError::BadConfigVal);
        }
        if !VALID_FORMATS.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(UlError::BadConfigVal);
        }
        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|_| UlError::Internal)
    }
}
