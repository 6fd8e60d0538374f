//! Tracing subscriber setup

use crate::config::{BridgeConfig, LogFormat};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber described by `config`
///
/// Returns `false` when a subscriber was already installed, e.g. by the
/// embedding application; that subscriber is kept.
pub fn init_tracing(config: &BridgeConfig) -> bool {
    let (filter, rejected) = match EnvFilter::try_new(&config.log_filter) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new("info"), Some(e)),
    };

    let installed = match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
            .is_ok(),
    };

    if let Some(e) = rejected {
        tracing::warn!(
            "invalid log filter {:?}, falling back to info: {}",
            config.log_filter,
            e
        );
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_keeps_first_subscriber() {
        let config = BridgeConfig::default();
        init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
