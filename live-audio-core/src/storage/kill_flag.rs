use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::models::error::FlagStoreError;
use crate::models::kill_record::KillRecord;
use crate::traits::kill_flag_store::KillFlagStore;

/// Kill flag persisted as a small JSON file.
///
/// The flag is raised while the file exists; its content is the
/// [`KillRecord`]. An in-process lock serializes every access so that
/// `consume` is a single read-and-remove step.
pub struct FileKillFlag {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKillFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store the flag as `was_killed.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("was_killed.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Details of the raised flag, without clearing it.
    ///
    /// Returns `None` when the flag is down or the file cannot be parsed.
    pub fn record(&self) -> Result<Option<KillRecord>, FlagStoreError> {
        let _guard = self.lock.lock();
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("failed to read kill flag", e)),
        };
        match serde_json::from_str(&json) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                log::warn!("kill flag at {} is unreadable: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    fn exists(&self) -> Result<bool, FlagStoreError> {
        match fs::metadata(&self.path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_error("failed to stat kill flag", e)),
        }
    }

    fn remove(&self) -> Result<(), FlagStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("failed to clear kill flag", e)),
        }
    }
}

impl KillFlagStore for FileKillFlag {
    fn set(&self, record: KillRecord) -> Result<(), FlagStoreError> {
        let _guard = self.lock.lock();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| storage_error("failed to create kill flag directory", e))?;
        }

        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| FlagStoreError::Storage(format!("failed to serialize kill record: {}", e)))?;

        // never leave a half-written flag behind
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| storage_error("failed to write kill flag", e))?;
        fs::rename(&tmp, &self.path).map_err(|e| storage_error("failed to commit kill flag", e))?;

        log::info!("kill flag raised ({}) at {}", record.reason, self.path.display());
        Ok(())
    }

    fn peek(&self) -> Result<bool, FlagStoreError> {
        let _guard = self.lock.lock();
        self.exists()
    }

    fn clear(&self) -> Result<(), FlagStoreError> {
        let _guard = self.lock.lock();
        self.remove()
    }

    fn consume(&self) -> Result<bool, FlagStoreError> {
        let _guard = self.lock.lock();
        if !self.exists()? {
            return Ok(false);
        }
        self.remove()?;
        log::debug!("kill flag consumed");
        Ok(true)
    }
}

/// Process-local kill flag, for hosts without durable storage and for tests.
#[derive(Default)]
pub struct MemoryKillFlag {
    record: Mutex<Option<KillRecord>>,
}

impl MemoryKillFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) -> Option<KillRecord> {
        self.record.lock().clone()
    }
}

impl KillFlagStore for MemoryKillFlag {
    fn set(&self, record: KillRecord) -> Result<(), FlagStoreError> {
        *self.record.lock() = Some(record);
        Ok(())
    }

    fn peek(&self) -> Result<bool, FlagStoreError> {
        Ok(self.record.lock().is_some())
    }

    fn clear(&self) -> Result<(), FlagStoreError> {
        *self.record.lock() = None;
        Ok(())
    }

    fn consume(&self) -> Result<bool, FlagStoreError> {
        Ok(self.record.lock().take().is_some())
    }
}

fn storage_error(context: &str, e: std::io::Error) -> FlagStoreError {
    FlagStoreError::Storage(format!("{}: {}", context, e))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;
    use crate::models::events::StopReason;

    fn record(reason: StopReason) -> KillRecord {
        KillRecord::new(reason, Some(Uuid::new_v4()))
    }

    #[test]
    fn never_set_reads_false() {
        let dir = TempDir::new().unwrap();
        let flag = FileKillFlag::in_dir(dir.path());

        assert!(!flag.peek().unwrap());
        assert!(!flag.consume().unwrap());
        flag.clear().unwrap();
        assert_eq!(flag.record().unwrap(), None);
    }

    #[test]
    fn consume_returns_prior_value_then_false() {
        let dir = TempDir::new().unwrap();
        let flag = FileKillFlag::in_dir(dir.path());

        flag.set(record(StopReason::TaskRemoved)).unwrap();
        assert!(flag.peek().unwrap());
        assert!(flag.peek().unwrap());

        assert!(flag.consume().unwrap());
        assert!(!flag.consume().unwrap());
        assert!(!flag.peek().unwrap());
    }

    #[test]
    fn flag_survives_a_new_store_instance() {
        let dir = TempDir::new().unwrap();
        let original = record(StopReason::Destroy);
        FileKillFlag::in_dir(dir.path()).set(original.clone()).unwrap();

        let reopened = FileKillFlag::in_dir(dir.path());
        assert_eq!(reopened.record().unwrap(), Some(original));
        reopened.clear().unwrap();
        assert!(!reopened.peek().unwrap());
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let flag = FileKillFlag::new(dir.path().join("nested/state/flag.json"));

        flag.set(record(StopReason::ProcessKilled)).unwrap();
        assert!(flag.path().exists());
        assert!(!flag.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn unreadable_content_still_counts_as_raised() {
        let dir = TempDir::new().unwrap();
        let flag = FileKillFlag::in_dir(dir.path());
        fs::write(flag.path(), "not json").unwrap();

        assert_eq!(flag.record().unwrap(), None);
        assert!(flag.consume().unwrap());
        assert!(!flag.peek().unwrap());
    }

    #[test]
    fn concurrent_consumers_see_the_flag_exactly_once() {
        let dir = TempDir::new().unwrap();
        let flag = Arc::new(FileKillFlag::in_dir(dir.path()));
        flag.set(record(StopReason::TaskRemoved)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let flag = Arc::clone(&flag);
                thread::spawn(move || flag.consume().unwrap())
            })
            .collect();
        let hits = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|hit| *hit)
            .count();

        assert_eq!(hits, 1);
    }

    #[test]
    fn memory_flag_semantics() {
        let flag = MemoryKillFlag::new();
        assert!(!flag.consume().unwrap());

        flag.set(record(StopReason::TaskRemoved)).unwrap();
        assert!(flag.peek().unwrap());
        assert_eq!(flag.record().unwrap().reason, StopReason::TaskRemoved);

        assert!(flag.consume().unwrap());
        assert!(!flag.consume().unwrap());

        flag.set(record(StopReason::Destroy)).unwrap();
        flag.clear().unwrap();
        assert!(!flag.peek().unwrap());
    }
}
