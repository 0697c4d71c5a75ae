//! Engine configuration and logging setup.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scheduler::DEFAULT_TICK_MS;

/// Environment variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "QFX_LOG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Tick interval must be at least 1 ms")]
    ZeroTickInterval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Scheduler period in milliseconds (default: 100, 10 Hz)
    pub tick_interval_ms: u64,
    /// PRNG seed for reproducible random effects (default: OS entropy)
    pub seed: Option<u64>,
    /// Log filter used when neither `QFX_LOG` nor `RUST_LOG` is set
    pub log_level: String,
    /// Rig JSON file (default: the built-in demo rig)
    pub rig_path: Option<PathBuf>,
    /// How often the DMX frame is logged
    pub monitor_interval_ms: u64,
    /// Stop after this many ticks
    pub max_ticks: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_MS,
            seed: None,
            log_level: "info".to_string(),
            rig_path: None,
            monitor_interval_ms: 1000,
            max_ticks: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        if config.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(config)
    }

    /// Read the config file, or use defaults when there is none.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_json(&fs::read_to_string(path)?),
            None => Ok(Self::default()),
        }
    }
}

/// Pick the log filter: `QFX_LOG`, then `RUST_LOG`, then the configured level.
pub fn log_filter(config: &EngineConfig) -> String {
    std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| config.log_level.clone())
}

/// Install the env_logger backend. Calling it twice is harmless.
pub fn init_logging(config: &EngineConfig) {
    let filter = log_filter(config);
    let initialised = env_logger::Builder::new()
        .parse_filters(&filter)
        .format_timestamp_millis()
        .try_init()
        .is_ok();
    if initialised {
        log::debug!("Logging initialised with filter \"{filter}\"");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval_ms, 100);
        assert_eq!(config.monitor_interval_ms, 1000);
        assert_eq!(config.log_level, "info");
        assert!(config.seed.is_none());
        assert!(config.max_ticks.is_none());
        assert_eq!(EngineConfig::load(None).unwrap(), config);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"seed": 42, "maxTicks": 30}"#).unwrap();
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.max_ticks, Some(30));
        assert_eq!(config.tick_interval_ms, 100);
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"tickIntervalMs": 0}"#),
            Err(ConfigError::ZeroTickInterval)
        ));
        assert!(matches!(EngineConfig::from_json("{"), Err(ConfigError::Json(_))));
        assert!(matches!(
            EngineConfig::from_json(r#"{"tickIntervalMs": "x"}"#),
            Err(ConfigError::Json(_))
        ));
    }
}
