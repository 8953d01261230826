use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JournalError {
    #[error("journal I/O error: {0}")]
    Io(String),

    #[error("journal entry is corrupt: {0}")]
    Corrupt(String),
}

/// The recording the service believes is in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub session_id: Uuid,
    pub started_at: String,
    pub wav_file: PathBuf,
}

impl JournalEntry {
    pub fn new(session_id: Uuid, wav_file: impl Into<PathBuf>) -> Self {
        Self {
            session_id,
            started_at: chrono::Utc::now().to_rfc3339(),
            wav_file: wav_file.into(),
        }
    }
}

/// Marker file written while a recording runs and removed when it ends.
///
/// A marker still present when the service is constructed means the previous
/// process died mid-recording without running any teardown.
#[derive(Debug, Clone)]
pub struct ServiceJournal {
    path: PathBuf,
}

impl ServiceJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Keep the marker as `active_session.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("active_session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn begin(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| JournalError::Io(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(entry)
            .map_err(|e| JournalError::Io(format!("serialize: {}", e)))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| JournalError::Io(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| JournalError::Io(e.to_string()))
    }

    pub fn finish(&self) -> Result<(), JournalError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(JournalError::Io(e.to_string())),
        }
    }

    pub fn current(&self) -> Result<Option<JournalEntry>, JournalError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(JournalError::Io(e.to_string())),
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| JournalError::Corrupt(e.to_string()))
    }

    /// Remove and return a marker left behind by a previous process.
    ///
    /// A corrupt marker is removed as well and reported as
    /// [`JournalError::Corrupt`].
    pub fn take_abandoned(&self) -> Result<Option<JournalEntry>, JournalError> {
        let entry = self.current();
        if !matches!(entry, Ok(None)) {
            self.finish()?;
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn begin_then_finish_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let journal = ServiceJournal::in_dir(dir.path());
        let entry = JournalEntry::new(Uuid::new_v4(), "/tmp/take.wav");

        journal.begin(&entry).unwrap();
        assert_eq!(journal.current().unwrap(), Some(entry));

        journal.finish().unwrap();
        assert_eq!(journal.current().unwrap(), None);
        journal.finish().unwrap();
    }

    #[test]
    fn begin_replaces_the_entry_without_leaving_a_temp_file() {
        let dir = TempDir::new().unwrap();
        let journal = ServiceJournal::new(dir.path().join("state/active_session.json"));
        let first = JournalEntry::new(Uuid::new_v4(), "first.wav");
        let second = JournalEntry::new(Uuid::new_v4(), "second.wav");

        journal.begin(&first).unwrap();
        journal.begin(&second).unwrap();

        assert_eq!(journal.current().unwrap(), Some(second));
        assert!(!journal.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn abandoned_entry_is_taken_once() {
        let dir = TempDir::new().unwrap();
        let entry = JournalEntry::new(Uuid::new_v4(), "take.wav");
        ServiceJournal::in_dir(dir.path()).begin(&entry).unwrap();

        let journal = ServiceJournal::in_dir(dir.path());
        assert_eq!(journal.take_abandoned().unwrap(), Some(entry));
        assert_eq!(journal.take_abandoned().unwrap(), None);
    }

    #[test]
    fn corrupt_entry_is_removed() {
        let dir = TempDir::new().unwrap();
        let journal = ServiceJournal::in_dir(dir.path());
        fs::write(journal.path(), "{").unwrap();

        assert!(matches!(journal.take_abandoned(), Err(JournalError::Corrupt(_))));
        assert!(!journal.path().exists());
    }
}
