//! Streaming configuration
//!
//! Persisted as JSON. Missing fields take their defaults, so older files keep
//! loading as options are added.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{StreamError, StreamResult};

/// Threaded callback bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Worker shutdown timeout, in nominal block periods
    pub shutdown_timeout_blocks: u32,
    /// Lower bound for the shutdown timeout (ms)
    pub min_shutdown_timeout_ms: u64,
    /// Elevate the worker thread to real-time priority
    pub realtime_priority: bool,
    /// Report deadline misses to the user callback every N misses
    pub overrun_report_interval: u64,
    /// Name given to the worker thread
    pub worker_thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_blocks: 40,
            min_shutdown_timeout_ms: 100,
            realtime_priority: true,
            overrun_report_interval: 1,
            worker_thread_name: "rf-bridge-worker".into(),
        }
    }
}

impl BridgeConfig {
    /// Shutdown timeout for a session with the given block period
    pub fn shutdown_timeout(&self, block_period: Duration) -> Duration {
        let scaled = block_period.saturating_mul(self.shutdown_timeout_blocks);
        scaled.max(Duration::from_millis(self.min_shutdown_timeout_ms))
    }

    pub fn validate(&self) -> StreamResult<()> {
        if self.shutdown_timeout_blocks == 0 {
            return Err(StreamError::InvalidConfig(
                "shutdown_timeout_blocks must be at least 1".into(),
            ));
        }
        if self.overrun_report_interval == 0 {
            return Err(StreamError::InvalidConfig(
                "overrun_report_interval must be at least 1".into(),
            ));
        }
        if self.worker_thread_name.is_empty() {
            return Err(StreamError::InvalidConfig(
                "worker_thread_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Processing-time measurement settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// Samples to accumulate before a load report is produced
    pub samples_to_average: u64,
    /// Lower bound for the polling thread shutdown timeout (ms)
    pub min_shutdown_timeout_ms: u64,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            samples_to_average: 48_000,
            min_shutdown_timeout_ms: 100,
        }
    }
}

impl MeasurementConfig {
    pub fn with_samples_to_average(samples_to_average: u64) -> Self {
        Self {
            samples_to_average,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> StreamResult<()> {
        if self.samples_to_average == 0 {
            return Err(StreamError::InvalidConfig(
                "samples_to_average must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Complete streaming configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub bridge: BridgeConfig,
    pub measurement: MeasurementConfig,
}

impl StreamConfig {
    /// Load from a JSON file, falling back to defaults if the file is
    /// missing or unreadable
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Invalid stream config {}: {} (using defaults)", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::debug!("No stream config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Strict variant of [`load_from`](Self::load_from): parse errors and
    /// invalid values are returned instead of replaced
    pub fn try_load_from<P: AsRef<Path>>(path: P) -> StreamResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| StreamError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> StreamResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StreamError::Serialization(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> StreamResult<()> {
        self.bridge.validate()?;
        self.measurement.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.bridge.shutdown_timeout_blocks, 40);
        assert_eq!(config.measurement.samples_to_average, 48_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shutdown_timeout_scales_with_block_period() {
        let config = BridgeConfig::default();
        // 4096 samples @ 48 kHz = 85.33 ms per block
        let period = Duration::from_secs_f64(4096.0 / 48_000.0);
        let timeout = config.shutdown_timeout(period);
        assert!(timeout > Duration::from_secs(3));
        assert!(timeout < Duration::from_secs(4));
    }

    #[test]
    fn test_shutdown_timeout_floor() {
        let config = BridgeConfig::default();
        let period = Duration::from_micros(10);
        assert_eq!(config.shutdown_timeout(period), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: StreamConfig =
            serde_json::from_str(r#"{ "bridge": { "realtime_priority": false } }"#).unwrap();
        assert!(!config.bridge.realtime_priority);
        assert_eq!(config.bridge.shutdown_timeout_blocks, 40);
        assert_eq!(config.measurement, MeasurementConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = StreamConfig::default();
        config.measurement.samples_to_average = 0;
        assert!(matches!(config.validate(), Err(StreamError::InvalidConfig(_))));

        let mut config = StreamConfig::default();
        config.bridge.overrun_report_interval = 0;
        assert!(config.validate().is_err());
    }
}
