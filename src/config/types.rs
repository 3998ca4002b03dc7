//! Configuration type definitions.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    /// Default command prefix, used unless a guild overrides it.
    pub prefix: String,
    /// The only guild the bot moderates.
    pub guild: u64,
    /// Home channel receiving every notification.
    pub home: u64,
    /// Role names whose holders are never moderated.
    #[serde(default)]
    pub exemptions: Vec<String>,
    /// Channels where deletions are not reported (besides the home channel).
    #[serde(default)]
    pub ignored_delete_channels: Vec<u64>,
    #[serde(default)]
    pub welcome: WelcomeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub mode: BotMode,
}

/// Discord credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub owner_id: u64,
    pub token: String,
}

/// Texts used when greeting new members.
#[derive(Debug, Clone, Deserialize)]
pub struct WelcomeConfig {
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// Channel new members are pointed at first.
    pub rules_channel: Option<u64>,
    /// Channel where welcome posts are made.
    pub introductions_channel: Option<u64>,
}

impl Default for WelcomeConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            rules_channel: None,
            introductions_channel: None,
        }
    }
}

fn default_server_name() -> String {
    "Nyanners".to_string()
}

/// Locations of the files the bot reads and writes.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_censorship_file")]
    pub censorship_file: String,
    #[serde(default = "default_welcomes_file")]
    pub welcomes_file: String,
    #[serde(default = "default_database_file")]
    pub database_file: String,
    #[serde(default = "default_dev_database_file")]
    pub dev_database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            censorship_file: default_censorship_file(),
            welcomes_file: default_welcomes_file(),
            database_file: default_database_file(),
            dev_database_file: default_dev_database_file(),
        }
    }
}

impl StorageConfig {
    pub fn censorship_path(&self) -> PathBuf {
        self.data_dir.join(&self.censorship_file)
    }

    pub fn welcomes_path(&self) -> PathBuf {
        self.data_dir.join(&self.welcomes_file)
    }

    /// Settings database for the given run mode. Dev runs never touch the live database.
    pub fn database_path(&self, mode: BotMode) -> PathBuf {
        match mode {
            BotMode::Live => self.data_dir.join(&self.database_file),
            BotMode::Dev => self.data_dir.join(&self.dev_database_file),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_censorship_file() -> String {
    "censorship.json".to_string()
}

fn default_welcomes_file() -> String {
    "welcomes.json".to_string()
}

fn default_database_file() -> String {
    "dbqasi.sqlite3".to_string()
}

fn default_dev_database_file() -> String {
    "devqasi.sqlite3".to_string()
}

/// Which handler set the bot runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    /// Full moderation and notifications.
    #[default]
    Live,
    /// Lifecycle logging and commands only, against a separate database.
    Dev,
}

impl FromStr for BotMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" | "prod" | "production" => Ok(Self::Live),
            "dev" | "development" => Ok(Self::Dev),
            other => Err(format!("unknown mode '{}' (use: live, dev)", other)),
        }
    }
}

impl std::fmt::Display for BotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Dev => write!(f, "dev"),
        }
    }
}

/// Block-lists used by the message filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CensorshipLists {
    #[serde(default)]
    pub banned: Vec<String>,
    #[serde(default)]
    pub warned: Vec<String>,
    /// Patterns that cancel a warned-list hit.
    #[serde(default, rename = "false")]
    pub false_positive: Vec<String>,
}
