//! Configuration for the bridge

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable holding the log filter directive
pub const ENV_LOG: &str = "NDI_BRIDGE_LOG";
/// Environment variable selecting `text` or `json` log output
pub const ENV_LOG_FORMAT: &str = "NDI_BRIDGE_LOG_FORMAT";
/// Environment variable sizing the worker pool
pub const ENV_WORKERS: &str = "NDI_BRIDGE_WORKERS";

const MAX_WORKER_THREADS: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines (default)
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// `tracing` filter directive (default: "info")
    pub log_filter: String,

    /// Log output format (default: text)
    pub log_format: LogFormat,

    /// Worker slots available to native work (default: 4, range: 1-64)
    pub worker_threads: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
            worker_threads: 4,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON configuration; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the `NDI_BRIDGE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`BridgeConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(filter) = lookup(ENV_LOG) {
            config.log_filter = filter;
        }

        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            config.log_format = format.parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_LOG_FORMAT,
                value: format.clone(),
            })?;
        }

        if let Some(workers) = lookup(ENV_WORKERS) {
            config.worker_threads =
                workers
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnv {
                        name: ENV_WORKERS,
                        value: workers.clone(),
                    })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `worker_threads` is not in range 1-64
    /// - `log_filter` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 || self.worker_threads > MAX_WORKER_THREADS {
            return Err(ConfigError::Invalid(format!(
                "worker_threads must be in range 1-{}, got {}",
                MAX_WORKER_THREADS, self.worker_threads
            )));
        }

        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "log_filter must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.worker_threads, 4);
    }

    #[test]
    fn test_from_json_partial() {
        let config = BridgeConfig::from_json(r#"{"log_format": "json"}"#).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.worker_threads, 4);
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        let err = BridgeConfig::from_json(r#"{"worker_threads": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = BridgeConfig::from_json(r#"{"log_format": "xml"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_lookup() {
        let config = BridgeConfig::from_lookup(lookup(&[
            (ENV_LOG, "ndi_bridge_core=debug"),
            (ENV_LOG_FORMAT, "JSON"),
            (ENV_WORKERS, "8"),
        ]))
        .unwrap();
        assert_eq!(config.log_filter, "ndi_bridge_core=debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.worker_threads, 8);
    }

    #[test]
    fn test_from_lookup_invalid_workers() {
        let err = BridgeConfig::from_lookup(lookup(&[(ENV_WORKERS, "many")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                name: ENV_WORKERS,
                value: "many".to_string()
            }
        );

        let err = BridgeConfig::from_lookup(lookup(&[(ENV_WORKERS, "65")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
