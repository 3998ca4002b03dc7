//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::{CensorshipLists, Config};

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.auth.token.is_empty() {
        errors.push("auth.token is required".to_string());
    }
    if config.auth.token == "YOUR_DISCORD_TOKEN_HERE" {
        errors.push("auth.token has not been configured (still using placeholder)".to_string());
    }
    if config.auth.owner_id == 0 {
        errors.push("auth.owner_id must be non-zero".to_string());
    }

    if config.prefix.trim().is_empty() {
        errors.push("prefix must not be empty".to_string());
    }
    if config.prefix.chars().any(char::is_whitespace) {
        errors.push(format!("prefix '{}' must not contain whitespace", config.prefix));
    }

    // Serenity ids panic on zero
    if config.guild == 0 {
        errors.push("guild must be non-zero".to_string());
    }
    if config.home == 0 {
        errors.push("home must be non-zero".to_string());
    }
    for (i, channel) in config.ignored_delete_channels.iter().enumerate() {
        if *channel == 0 {
            errors.push(format!("ignored_delete_channels[{}] must be non-zero", i));
        }
    }
    if config.welcome.rules_channel == Some(0) {
        errors.push("welcome.rules_channel must be non-zero".to_string());
    }
    if config.welcome.introductions_channel == Some(0) {
        errors.push("welcome.introductions_channel must be non-zero".to_string());
    }

    for (i, role) in config.exemptions.iter().enumerate() {
        if role.trim().is_empty() {
            errors.push(format!("exemptions[{}] is empty", i));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

/// Check that every block-list entry compiles as a pattern.
pub fn validate_censorship(lists: &CensorshipLists) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    let named = [
        ("banned", &lists.banned),
        ("warned", &lists.warned),
        ("false", &lists.false_positive),
    ];
    for (name, patterns) in named {
        for (i, pattern) in patterns.iter().enumerate() {
            if pattern.is_empty() {
                errors.push(format!("{}[{}] is empty", name, i));
            } else if fancy_regex::Regex::new(pattern).is_err() {
                errors.push(format!("{}[{}] is not a valid regex: '{}'", name, i, pattern));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_valid_config() -> Config {
        Config {
            auth: AuthConfig {
                owner_id: 42,
                token: "valid_token_here".to_string(),
            },
            prefix: "!".to_string(),
            guild: 123456789,
            home: 987654321,
            exemptions: vec!["Moderator".to_string(), "Admin".to_string()],
            ignored_delete_channels: vec![223941383583432705],
            welcome: WelcomeConfig::default(),
            storage: StorageConfig::default(),
            mode: BotMode::Live,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&make_valid_config()).is_ok());
    }

    #[test]
    fn test_empty_token_fails() {
        let mut config = make_valid_config();
        config.auth.token = String::new();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("auth.token"));
    }

    #[test]
    fn test_placeholder_token_fails() {
        let mut config = make_valid_config();
        config.auth.token = "YOUR_DISCORD_TOKEN_HERE".to_string();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("placeholder"));
    }

    #[test]
    fn test_zero_ids_fail() {
        let mut config = make_valid_config();
        config.guild = 0;
        config.home = 0;

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("guild must be non-zero"));
        assert!(message.contains("home must be non-zero"));
    }

    #[test]
    fn test_prefix_with_space_fails() {
        let mut config = make_valid_config();
        config.prefix = "q !".to_string();

        assert!(validate_config(&config)
            .unwrap_err()
            .to_string()
            .contains("whitespace"));
    }

    #[test]
    fn test_invalid_regex_in_lists_fails() {
        let lists = CensorshipLists {
            banned: vec!["[invalid".to_string()],
            warned: vec!["ok".to_string()],
            false_positive: Vec::new(),
        };

        let result = validate_censorship(&lists);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("banned[0] is not a valid regex"));
    }

    #[test]
    fn test_valid_lists_pass() {
        let lists = CensorshipLists {
            banned: vec!["slur".to_string()],
            warned: vec!["\\bcat\\b".to_string()],
            false_positive: vec!["catalog".to_string()],
        };
        assert!(validate_censorship(&lists).is_ok());
    }
}
