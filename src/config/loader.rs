//! Configuration loading from files (std only).

use std::fs;
use std::path::Path;

use crate::error::ConfigError;

use super::HatConfig;

/// Load and validate a HAT configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the
/// configuration fails validation.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<HatConfig, ConfigError> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| {
        let msg = heapless::String::try_from(e.to_string().as_str()).unwrap_or_default();
        ConfigError::Io(msg)
    })?;

    parse_config(&content)
}

/// Parse and validate a HAT configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or fails validation.
pub fn parse_config(content: &str) -> Result<HatConfig, ConfigError> {
    let config: HatConfig = toml::from_str(content).map_err(|e| {
        let msg = heapless::String::try_from(e.message()).unwrap_or_default();
        ConfigError::Parse(msg)
    })?;

    super::validation::validate_config(&config)?;

    Ok(config)
}
