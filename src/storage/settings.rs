//! Key-value settings store backed by SQLite.
//!
//! Each guild owns one row holding a JSON object of settings. Guild `0`
//! holds global settings.

use std::path::Path;
use std::str::FromStr;

use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::common::error::{StorageError, StorageResult};

/// Guild id under which global settings are stored.
pub const GLOBAL: u64 = 0;

/// Settings key holding a guild's command prefix.
pub const PREFIX_KEY: &str = "prefix";

/// Persistent per-guild settings.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    pool: SqlitePool,
}

impl SettingsStore {
    /// Open (or create) the settings database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        info!("Opening settings database at {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::with_options(options).await
    }

    /// Open an in-memory database for testing.
    #[cfg(test)]
    pub async fn open_in_memory() -> StorageResult<Self> {
        debug!("Opening in-memory settings database");
        Self::with_options(SqliteConnectOptions::from_str("sqlite::memory:")?).await
    }

    async fn with_options(options: SqliteConnectOptions) -> StorageResult<Self> {
        // One connection: in-memory databases are per-connection
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS settings (guild INTEGER PRIMARY KEY, settings TEXT)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Get one setting for a guild.
    pub async fn get(&self, guild: u64, key: &str) -> StorageResult<Option<Value>> {
        let mut settings = self.load(guild).await?;
        Ok(settings.remove(key))
    }

    /// Get a string setting, ignoring values of other types.
    pub async fn get_str(&self, guild: u64, key: &str) -> StorageResult<Option<String>> {
        Ok(self
            .get(guild, key)
            .await?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    /// Set one setting for a guild, returning the previous value.
    pub async fn set(&self, guild: u64, key: &str, value: Value) -> StorageResult<Option<Value>> {
        let mut settings = self.load(guild).await?;
        let previous = settings.insert(key.to_string(), value);
        self.store(guild, &settings).await?;
        Ok(previous)
    }

    /// Remove one setting for a guild, returning the removed value.
    pub async fn remove(&self, guild: u64, key: &str) -> StorageResult<Option<Value>> {
        let mut settings = self.load(guild).await?;
        let previous = settings.remove(key);
        if previous.is_some() {
            self.store(guild, &settings).await?;
        }
        Ok(previous)
    }

    async fn load(&self, guild: u64) -> StorageResult<Map<String, Value>> {
        let row: Option<Option<String>> =
            sqlx::query_scalar("SELECT settings FROM settings WHERE guild = ?")
                .bind(row_id(guild))
                .fetch_optional(&self.pool)
                .await?;

        match row.flatten() {
            Some(json) => serde_json::from_str(&json)
                .map_err(|source| StorageError::Settings { guild, source }),
            None => Ok(Map::new()),
        }
    }

    async fn store(&self, guild: u64, settings: &Map<String, Value>) -> StorageResult<()> {
        let json = serde_json::to_string(settings)
            .map_err(|source| StorageError::Settings { guild, source })?;
        debug!("Storing {} settings for guild {}", settings.len(), guild);

        sqlx::query("INSERT OR REPLACE INTO settings (guild, settings) VALUES (?, ?)")
            .bind(row_id(guild))
            .bind(json)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Snowflakes fit in 63 bits, so the cast is lossless.
fn row_id(guild: u64) -> i64 {
    guild as i64
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_missing_setting_is_none() {
        let store = SettingsStore::open_in_memory().await.unwrap();
        assert_eq!(store.get(1, PREFIX_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = SettingsStore::open_in_memory().await.unwrap();
        assert_eq!(store.set(1, PREFIX_KEY, json!("?")).await.unwrap(), None);
        assert_eq!(store.get_str(1, PREFIX_KEY).await.unwrap().as_deref(), Some("?"));

        let previous = store.set(1, PREFIX_KEY, json!("$")).await.unwrap();
        assert_eq!(previous, Some(json!("?")));
    }

    #[tokio::test]
    async fn test_guilds_are_isolated() {
        let store = SettingsStore::open_in_memory().await.unwrap();
        store.set(1, PREFIX_KEY, json!("?")).await.unwrap();
        store.set(GLOBAL, PREFIX_KEY, json!("!")).await.unwrap();

        assert_eq!(store.get_str(2, PREFIX_KEY).await.unwrap(), None);
        assert_eq!(store.get_str(GLOBAL, PREFIX_KEY).await.unwrap().as_deref(), Some("!"));
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SettingsStore::open_in_memory().await.unwrap();
        store.set(1, "a", json!(1)).await.unwrap();
        store.set(1, "b", json!(true)).await.unwrap();

        assert_eq!(store.remove(1, "a").await.unwrap(), Some(json!(1)));
        assert_eq!(store.get(1, "a").await.unwrap(), None);
        assert_eq!(store.get(1, "b").await.unwrap(), Some(json!(true)));
        assert_eq!(store.remove(1, "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_str_ignores_other_types() {
        let store = SettingsStore::open_in_memory().await.unwrap();
        store.set(1, PREFIX_KEY, json!(5)).await.unwrap();
        assert_eq!(store.get_str(1, PREFIX_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dbqasi.sqlite3");

        {
            let store = SettingsStore::open(&path).await.unwrap();
            store.set(7, PREFIX_KEY, json!("q!")).await.unwrap();
            store.pool.close().await;
        }

        let store = SettingsStore::open(&path).await.unwrap();
        assert_eq!(store.get_str(7, PREFIX_KEY).await.unwrap().as_deref(), Some("q!"));
    }
}
