//! Sampling configuration and its reloadable controller.

use crate::error::{Result, SystemError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// The default sampling interval in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Which metric families are sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricToggles {
    pub cpu: bool,
    pub memory: bool,
    pub disk_io: bool,
    pub network_stats: bool,
    pub process_count: bool,
    pub context_switches: bool,
}

impl Default for MetricToggles {
    fn default() -> Self {
        Self {
            cpu: true,
            memory: true,
            disk_io: true,
            network_stats: true,
            process_count: true,
            context_switches: true,
        }
    }
}

/// What the sampling loop reads and how often.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Enabled metric families
    pub metrics: MetricToggles,
    /// Seconds between sampling cycles
    pub interval: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            metrics: MetricToggles::default(),
            interval: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl SamplingConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(SystemError::config_error("interval must be at least 1 second"));
        }
        Ok(())
    }

    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

/// Owns the active [`SamplingConfig`] and the file it is reloaded from.
#[derive(Debug)]
pub struct ConfigController {
    path: PathBuf,
    active: SamplingConfig,
}

impl ConfigController {
    /// Wrap an already-loaded configuration.
    pub fn new(path: impl Into<PathBuf>, active: SamplingConfig) -> Self {
        Self {
            path: path.into(),
            active,
        }
    }

    /// Load the config at `path`, falling back to defaults if it is missing
    /// or invalid.
    pub fn load_initial(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let active = match SamplingConfig::from_file(&path) {
            Ok(config) => {
                info!(path = %path.display(), interval = config.interval, "Loaded configuration");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Using default configuration");
                SamplingConfig::default()
            }
        };
        Self { path, active }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn active(&self) -> &SamplingConfig {
        &self.active
    }

    /// Re-read the config file. The new config replaces the active one only
    /// if it parses and validates completely.
    pub fn reload(&mut self) -> Result<&SamplingConfig> {
        let config = SamplingConfig::from_file(&self.path)?;
        if config != self.active {
            info!(
                interval = config.interval,
                metrics = ?config.metrics,
                "Configuration changed"
            );
        }
        self.active = config;
        Ok(&self.active)
    }
}
