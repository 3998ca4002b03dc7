//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `QASI_TOKEN` - Discord bot token
//! - `QASI_OWNER_ID` - Bot owner user ID
//! - `QASI_PREFIX` - Default command prefix
//! - `QASI_GUILD_ID` - Moderated guild ID
//! - `QASI_HOME_CHANNEL` - Notification channel ID
//! - `QASI_DATA_DIR` - Directory holding the data files
//! - `QASI_MODE` - `live` or `dev`

use std::env;

use tracing::warn;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "QASI";

/// Apply environment variable overrides to a config.
///
/// This allows the token to be provided via the environment
/// instead of the config file.
pub fn apply_env_overrides(config: Config) -> Config {
    apply_overrides_from(config, |name| env::var(name).ok())
}

fn apply_overrides_from(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    let var = |suffix: &str| lookup(&format!("{}_{}", ENV_PREFIX, suffix));

    if let Some(token) = var("TOKEN") {
        config.auth.token = token;
    }
    if let Some(prefix) = var("PREFIX") {
        config.prefix = prefix;
    }
    if let Some(owner) = var("OWNER_ID") {
        match owner.parse() {
            Ok(id) => config.auth.owner_id = id,
            Err(e) => warn!("Ignoring {}_OWNER_ID '{}': {}", ENV_PREFIX, owner, e),
        }
    }
    if let Some(guild) = var("GUILD_ID") {
        match guild.parse() {
            Ok(id) => config.guild = id,
            Err(e) => warn!("Ignoring {}_GUILD_ID '{}': {}", ENV_PREFIX, guild, e),
        }
    }
    if let Some(home) = var("HOME_CHANNEL") {
        match home.parse() {
            Ok(id) => config.home = id,
            Err(e) => warn!("Ignoring {}_HOME_CHANNEL '{}': {}", ENV_PREFIX, home, e),
        }
    }
    if let Some(dir) = var("DATA_DIR") {
        config.storage.data_dir = dir.into();
    }
    if let Some(mode) = var("MODE") {
        match mode.parse() {
            Ok(mode) => config.mode = mode,
            Err(e) => warn!("Ignoring {}_MODE: {}", ENV_PREFIX, e),
        }
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `QASI_CONFIG` environment variable, otherwise returns "data/config.json".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "data/config.json".to_string())
}
