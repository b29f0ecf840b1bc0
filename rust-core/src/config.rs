//! Engine configuration
//!
//! Loadable from TOML; every field has a default so a partial file is fine.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Worker pool and diagnostics configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of worker threads executing instance cycles
    pub workers: usize,

    /// Prefix for worker thread names (suffixed with the worker index)
    pub thread_name: String,

    /// Depth of each data-ready subscription queue
    pub notify_depth: usize,

    /// Per-stage timing thresholds for debug reporting
    pub thresholds: StageThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            thread_name: "fft-worker".to_string(),
            notify_depth: 1,
            thresholds: StageThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text
    ///
    /// # Example
    /// ```
    /// use fft_instance::config::EngineConfig;
    /// let config = EngineConfig::from_toml_str("workers = 2").unwrap();
    /// assert_eq!(config.workers, 2);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Stage durations (seconds) above which a cycle logs a timing report
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StageThresholds {
    /// Collect + window
    pub prepare: f64,
    pub replan: f64,
    pub execute: f64,
    /// Derive + distribute
    pub post_process: f64,
}

impl Default for StageThresholds {
    fn default() -> Self {
        Self {
            prepare: 5e-3,
            replan: 0.1,
            execute: 3e-3,
            post_process: 1e-3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            workers = 3

            [thresholds]
            replan = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.workers, 3);
        assert_eq!(config.thread_name, "fft-worker");
        assert_eq!(config.thresholds.replan, 0.5);
        assert_eq!(config.thresholds.execute, 3e-3);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("workers = \"many\"").unwrap_err();
        assert!(matches!(err, crate::error::EngineError::Config(_)));
    }

    #[test]
    fn test_default_has_at_least_one_worker() {
        assert!(EngineConfig::default().workers >= 1);
    }
}
