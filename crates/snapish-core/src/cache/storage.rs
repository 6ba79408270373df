use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Durable string key/value storage, one file per key.
///
/// This is the device-local equivalent of browser `localStorage`: no expiry,
/// no locking. Several processes may share the same directory and the last
/// write wins.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    pub fn open(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            bail!("Invalid storage key: {:?}", key);
        }
        Ok(self.dir.join(key))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read storage key: {}", key)),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        // Write-then-rename so a reader never sees half a value
        let tmp = self.dir.join(format!(".{}.tmp", key));
        std::fs::write(&tmp, value)
            .with_context(|| format!("Failed to write storage key: {}", key))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to commit storage key: {}", key))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove storage key: {}", key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage() -> (LocalStorage, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let storage = LocalStorage::open(dir.path().join("storage")).expect("open storage");
        (storage, dir)
    }

    #[test]
    fn test_get_missing_key_is_absent() {
        let (storage, _dir) = storage();
        assert_eq!(storage.get("token").expect("get"), None);
    }

    #[test]
    fn test_set_overwrites_and_remove_clears() {
        let (storage, _dir) = storage();
        storage.set("token", "first").expect("set");
        storage.set("token", "second").expect("set");
        assert_eq!(storage.get("token").expect("get").as_deref(), Some("second"));

        storage.remove("token").expect("remove");
        assert_eq!(storage.get("token").expect("get"), None);

        // Removing twice is fine
        storage.remove("token").expect("remove again");
    }

    #[test]
    fn test_values_survive_reopen() {
        let (storage, _dir) = storage();
        storage.set("hotIssues", "[]").expect("set");

        let reopened = LocalStorage::open(storage.dir().to_path_buf()).expect("reopen");
        assert_eq!(reopened.get("hotIssues").expect("get").as_deref(), Some("[]"));
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let (storage, _dir) = storage();
        assert!(storage.set("../escape", "x").is_err());
        assert!(storage.get("").is_err());
    }
}
