//! Key/value persistence for session data.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::StoreError;

/// Minimal string key/value store backing the session.
pub trait SessionStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    /// Returns an error when the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error when the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value. Removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns an error when the backing storage cannot be written.
    fn clear(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store, used by tests and as a fallback.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.guard().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.guard().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.guard().remove(key);
        Ok(())
    }
}

/// Store persisted as a single JSON object on disk.
///
/// Every operation reads the file fresh so separate processes observe each
/// other's writes.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    /// Store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents)
            .map_err(|err| StoreError::Corrupt(format!("{}: {err}", self.path.display())))
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(values)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let staging = self.path.with_extension("json.tmp");
        write_owner_only(&staging, body.as_bytes())?;
        fs::rename(&staging, &self.path)?;
        debug!(path = %self.path.display(), "session store written");
        Ok(())
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.read_all()?;
        if apply(&mut values) {
            self.write_all(&values)?;
        }
        Ok(())
    }
}

/// Write `body` to `path`, readable by the owner only. The file holds the
/// bearer token.
fn write_owner_only(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        let file = options.open(path)?;
        // A leftover staging file keeps its old mode; reset it.
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        write_all(file, body)
    }
    #[cfg(not(unix))]
    {
        write_all(options.open(path)?, body)
    }
}

fn write_all(mut file: fs::File, body: &[u8]) -> io::Result<()> {
    file.write_all(body)?;
    file.sync_all()
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|values| {
            values.insert(key.to_owned(), value.to_owned());
            true
        })
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.update(|values| values.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_round_trips_across_instances() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("session.json");

        let first = FileSessionStore::new(&path);
        first.set("access_token", "tok1").expect("write token");
        first.set("workspace_id", "9001").expect("write workspace");

        let second = FileSessionStore::new(&path);
        assert_eq!(second.get("access_token").expect("read"), Some("tok1".into()));
        second.clear("access_token").expect("clear");
        assert_eq!(first.get("access_token").expect("read"), None);
        assert_eq!(first.get("workspace_id").expect("read"), Some("9001".into()));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").expect("seed file");

        let store = FileSessionStore::new(&path);
        assert!(matches!(store.get("access_token"), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn clearing_missing_key_does_not_create_file() {
        let dir = tempdir().expect("tempdir");
        let store = FileSessionStore::new(dir.path().join("session.json"));
        store.clear("anything").expect("clear");
        assert!(!store.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(path.with_extension("json.tmp"), "stale").expect("seed staging file");

        let store = FileSessionStore::new(&path);
        store.set("access_token", "tok1").expect("write token");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.get("access_token").expect("read"), Some("tok1".into()));
    }

    #[test]
    fn memory_store_overwrites_and_clears() {
        let store = MemorySessionStore::new();
        store.set("k", "a").expect("set");
        store.set("k", "b").expect("set");
        assert_eq!(store.get("k").expect("get"), Some("b".into()));
        store.clear("k").expect("clear");
        assert_eq!(store.get("k").expect("get"), None);
    }
}
