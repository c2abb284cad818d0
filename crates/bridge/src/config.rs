//! Bridge configuration via `plbridge.toml`
//!
//! A small config file next to the host application. When the file is
//! absent every field falls back to its default, so zero configuration is
//! a working configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Config file name looked up in the host's working directory.
pub const CONFIG_FILE_NAME: &str = "plbridge.toml";

/// Failure to load the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bridge configuration loaded from `plbridge.toml`.
///
/// # Example
///
/// ```toml
/// # Arguments handed to the engine at initialization, argv[0] included
/// engine_args = ["plbridge", "-q"]
///
/// # Port hint for the top-level session server; 0 picks an ephemeral port
/// server_port = 0
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Arguments handed to the engine at initialization.
    #[serde(default = "default_engine_args")]
    pub engine_args: Vec<String>,
    /// Port hint for the top-level session server (0 = ephemeral).
    #[serde(default)]
    pub server_port: u16,
}

fn default_engine_args() -> Vec<String> {
    vec!["plbridge".to_string()]
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            engine_args: default_engine_args(),
            server_port: 0,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<BridgeConfig, ConfigError> {
        if !path.exists() {
            return Ok(BridgeConfig::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::load(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.server_port, 0);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "server_port = 4550\n").unwrap();
        let config = BridgeConfig::load(&path).unwrap();
        assert_eq!(config.server_port, 4550);
        assert_eq!(config.engine_args, vec!["plbridge".to_string()]);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "server_port = \"not a port\"\n").unwrap();
        assert!(matches!(
            BridgeConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
