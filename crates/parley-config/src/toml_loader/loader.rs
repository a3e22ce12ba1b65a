//! Core TOML config loading: read from path or platform default.

use crate::schema::ParleyConfig;
use crate::validation;
use parley_common::ConfigError;
use std::path::Path;
use tracing::{info, warn};

use super::paths::{create_default_config, default_config_path};

/// Load config from a specific TOML file path.
///
/// Missing fields take their serde defaults. A config that parses but
/// fails validation is returned as-is with a warning; `load_config` is
/// the strict entry point.
pub fn load_from_path(path: &Path) -> Result<ParleyConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(path.to_path_buf())
        } else {
            ConfigError::ParseError(format!("failed to read {}: {e}", path.display()))
        }
    })?;

    let config: ParleyConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    if let Err(e) = validation::validate(&config) {
        warn!("config validation warning: {e}");
    }

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// On Linux: `~/.config/parley/config.toml`
/// On macOS: `~/Library/Application Support/parley/config.toml`
///
/// If the file does not exist, a commented default file is written and
/// defaults are returned.
pub fn load_default() -> Result<ParleyConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            info!("no config found at {}, creating default", path.display());
            create_default_config(&path)?;
            Ok(ParleyConfig::default())
        }
        Err(e) => Err(e),
    }
}
