use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(String),
    #[error("config parse error: {0}")]
    ParseError(String),
    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Directory holding per-party key records
    pub keys_dir: PathBuf,
    /// Local transaction store document
    pub store_path: PathBuf,
    /// Published public keys, name to key bundle
    pub directory_path: PathBuf,
    /// Group membership table
    pub groups_path: PathBuf,

    // Logging
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            keys_dir: PathBuf::from(".cop/keys"),
            store_path: PathBuf::from(".cop/store.json"),
            directory_path: PathBuf::from(".cop/directory.json"),
            groups_path: PathBuf::from(".cop/groups.json"),
            log_level: "info".to_string(),
        }
    }
}

impl CliConfig {
    pub fn load_from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileNotFound(e.to_string()))?;

        let config: CliConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn load_from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("COP_KEYS_DIR") {
            config.keys_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("COP_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("COP_DIRECTORY_PATH") {
            config.directory_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("COP_GROUPS_PATH") {
            config.groups_path = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = level;
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keys_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "keys_dir must not be empty".to_string(),
            ));
        }
        if self.store_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "store_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
