//! Welcome-state file: which users have already been greeted.
//!
//! The file maps user ids to a record. Older files hold plain booleans;
//! records written by this bot carry the time the welcome DMs were sent and,
//! once the member asked for it, the time a welcome was posted for them. Only
//! the presence of a key matters when deciding whether to greet someone.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common::error::{StorageError, StorageResult};

/// One entry of the welcome-state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WelcomeRecord {
    Posted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sent_at: Option<DateTime<Utc>>,
        posted_at: DateTime<Utc>,
    },
    Sent { sent_at: DateTime<Utc> },
    Flag(bool),
    Other(serde_json::Value),
}

/// What to do when a member joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WelcomeAction {
    /// First time we see this user: send the welcome DMs.
    SendWelcome,
    /// Already welcomed before; only tell the home channel.
    Skip,
}

/// In-memory view of the welcome-state file.
#[derive(Debug)]
pub struct WelcomeLog {
    path: PathBuf,
    entries: BTreeMap<u64, WelcomeRecord>,
}

impl WelcomeLog {
    /// Load the welcome-state file. A missing or malformed file is an error.
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path).map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let entries = serde_json::from_str(&content).map_err(|e| StorageError::Json {
            path: path.display().to_string(),
            source: e,
        })?;

        let log = Self { path, entries };
        info!("Loaded {} welcome records from {}", log.len(), log.path.display());
        Ok(log)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, user_id: u64) -> bool {
        self.entries.contains_key(&user_id)
    }

    /// Decide whether a joining user gets the welcome DMs.
    pub fn action_for(&self, user_id: u64) -> WelcomeAction {
        if self.contains(user_id) {
            WelcomeAction::Skip
        } else {
            WelcomeAction::SendWelcome
        }
    }

    /// Remember that a user was welcomed and write the file back.
    pub fn record(&mut self, user_id: u64, sent_at: DateTime<Utc>) -> StorageResult<()> {
        self.entries.insert(user_id, WelcomeRecord::Sent { sent_at });
        self.save()
    }

    /// Whether a welcome was already posted for this user.
    pub fn has_posted(&self, user_id: u64) -> bool {
        matches!(self.entries.get(&user_id), Some(WelcomeRecord::Posted { .. }))
    }

    /// Remember that a welcome was posted for a user, keeping the DM time.
    pub fn record_post(&mut self, user_id: u64, posted_at: DateTime<Utc>) -> StorageResult<()> {
        let sent_at = match self.entries.get(&user_id) {
            Some(WelcomeRecord::Sent { sent_at }) => Some(*sent_at),
            Some(WelcomeRecord::Posted { sent_at, .. }) => *sent_at,
            _ => None,
        };
        self.entries
            .insert(user_id, WelcomeRecord::Posted { sent_at, posted_at });
        self.save()
    }

    /// Write the file through a temporary sibling so a crash never truncates it.
    fn save(&self) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(&self.entries).map_err(|e| StorageError::Json {
            path: self.path.display().to_string(),
            source: e,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let io_err = |e| StorageError::Io {
            path: self.path.display().to_string(),
            source: e,
        };
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        debug!("Saved {} welcome records", self.entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("welcomes.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_absent_user_gets_welcome() {
        let dir = tempfile::tempdir().unwrap();
        let log = WelcomeLog::load(write_file(&dir, r#"{ "111": true }"#)).unwrap();
        assert_eq!(log.action_for(222), WelcomeAction::SendWelcome);
    }

    #[test]
    fn test_present_user_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log = WelcomeLog::load(write_file(&dir, r#"{ "111": true, "333": false }"#)).unwrap();
        assert_eq!(log.action_for(111), WelcomeAction::Skip);
        // Any value counts, including false
        assert_eq!(log.action_for(333), WelcomeAction::Skip);
    }

    #[test]
    fn test_unknown_record_shapes_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let log = WelcomeLog::load(write_file(&dir, r#"{ "1": { "note": "manual" }, "2": 7 }"#))
            .unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_record_writes_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "{}");

        let mut log = WelcomeLog::load(&path).unwrap();
        log.record(444, Utc::now()).unwrap();
        assert_eq!(log.action_for(444), WelcomeAction::Skip);

        let reloaded = WelcomeLog::load(&path).unwrap();
        assert!(reloaded.contains(444));
        assert!(matches!(reloaded.entries[&444], WelcomeRecord::Sent { .. }));
    }

    #[test]
    fn test_record_post_keeps_sent_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, r#"{ "555": true }"#);
        let sent_at = Utc::now();

        let mut log = WelcomeLog::load(&path).unwrap();
        log.record(444, sent_at).unwrap();
        assert!(!log.has_posted(444));

        log.record_post(444, Utc::now()).unwrap();
        log.record_post(555, Utc::now()).unwrap();
        assert!(log.has_posted(444));

        let reloaded = WelcomeLog::load(&path).unwrap();
        assert!(reloaded.has_posted(444));
        assert!(reloaded.has_posted(555));
        assert_eq!(reloaded.action_for(555), WelcomeAction::Skip);
        match &reloaded.entries[&444] {
            WelcomeRecord::Posted { sent_at: kept, .. } => assert_eq!(*kept, Some(sent_at)),
            other => panic!("expected posted record, got {:?}", other),
        }
        assert!(matches!(
            reloaded.entries[&555],
            WelcomeRecord::Posted { sent_at: None, .. }
        ));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = WelcomeLog::load(dir.path().join("missing.json"));
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = WelcomeLog::load(write_file(&dir, "not json"));
        assert!(matches!(result, Err(StorageError::Json { .. })));
    }
}
