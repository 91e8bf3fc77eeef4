use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

/// Returns the canonical config path: `~/.bookforge/config.yaml`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".bookforge").join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from("config.yaml"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.generation.providers.is_empty() {
        return Err(ConfigError::Validation {
            message: "at least one generation provider must be configured".to_string(),
        });
    }

    if config.worker.poll_interval_secs == 0 {
        return Err(ConfigError::Validation {
            message: "worker.poll_interval_secs must be greater than zero".to_string(),
        });
    }

    if config.event_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "event_capacity must be greater than zero".to_string(),
        });
    }

    Ok(())
}
