//! Configuration file parsing (JSON format).

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::common::error::ConfigError;
use crate::config::env::apply_env_overrides;
use crate::config::types::{CensorshipLists, Config};
use crate::config::validate::validate_config;

/// Load configuration from a JSON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    read_json(path.as_ref())
}

/// Load the config file, apply `QASI_*` overrides, then validate.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let config = apply_env_overrides(load_config(path)?);
    validate_config(&config)?;
    Ok(config)
}

/// Load the banned/warned/false-positive lists.
pub fn load_censorship(path: impl AsRef<Path>) -> Result<CensorshipLists, ConfigError> {
    read_json(path.as_ref())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
        message: format!("{}: {}", path.display(), e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::BotMode;

    fn load_config_str(content: &str) -> Result<Config, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
    }

    const MINIMAL: &str = r#"{
        "auth": { "owner_id": 1, "token": "abc" },
        "prefix": "!",
        "guild": 100,
        "home": 200
    }"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load_config_str(MINIMAL).unwrap();
        assert_eq!(config.prefix, "!");
        assert!(config.exemptions.is_empty());
        assert_eq!(config.mode, BotMode::Live);
        assert_eq!(config.welcome.server_name, "Nyanners");
        assert!(config
            .storage
            .database_path(BotMode::Dev)
            .ends_with("devqasi.sqlite3"));
    }

    #[test]
    fn test_missing_field_is_parse_error() {
        let result = load_config_str(r#"{ "prefix": "!" }"#);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_censorship_false_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("censorship.json");
        fs::write(&path, r#"{ "banned": ["slur"], "warned": ["cat"], "false": ["catalog"] }"#)
            .unwrap();

        let lists = load_censorship(&path).unwrap();
        assert_eq!(lists.banned, vec!["slur"]);
        assert_eq!(lists.false_positive, vec!["catalog"]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_censorship("/nonexistent/censorship.json");
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }
}
