//! Best-effort persistence for user preferences.
//!
//! Stored state is treated as an advisory cache: anything that fails to read or
//! validate is logged and replaced by the type's default.

use color_eyre::eyre::{eyre, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait Storage: Send + Sync {
    /// `None` when the key has never been written or cannot be read.
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// One JSON file per key inside a state directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| eyre!("Cannot create state directory {}: {e}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Option<String> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read stored state");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        // Write-then-rename so a crash never leaves a truncated file behind.
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path(key)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::default();
        let _ = storage.write(key, value);
        storage
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| io::Error::other("storage lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| io::Error::other("storage lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// A value stored under a fixed key.
pub trait Persist: Serialize + DeserializeOwned + Default {
    const KEY: &'static str;
}

/// Load a stored value, falling back to the default on any failure.
pub fn load_json<T: Persist>(storage: &dyn Storage) -> T {
    let Some(raw) = storage.read(T::KEY) else {
        return T::default();
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key = T::KEY, error = %e, "discarding invalid stored state");
            T::default()
        }
    }
}

/// Persist a value; failures are logged and otherwise ignored.
pub fn save_json<T: Persist>(storage: &dyn Storage, value: &T) {
    let json = match serde_json::to_string_pretty(value) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(key = T::KEY, error = %e, "failed to serialize state");
            return;
        }
    };
    if let Err(e) = storage.write(T::KEY, &json) {
        tracing::warn!(key = T::KEY, error = %e, "failed to persist state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u32,
    }

    impl Persist for Counter {
        const KEY: &'static str = "counter";
    }

    #[test]
    fn missing_key_loads_default() {
        let storage = MemoryStorage::default();
        assert_eq!(load_json::<Counter>(&storage), Counter::default());
    }

    #[test]
    fn corrupt_state_loads_default() {
        let storage = MemoryStorage::with_entry("counter", "{not json");
        assert_eq!(load_json::<Counter>(&storage), Counter::default());
        let wrong_shape = MemoryStorage::with_entry("counter", r#"{"value": "seven"}"#);
        assert_eq!(load_json::<Counter>(&wrong_shape), Counter::default());
    }

    #[test]
    fn memory_round_trip() {
        let storage = MemoryStorage::default();
        save_json(&storage, &Counter { value: 7 });
        assert_eq!(load_json::<Counter>(&storage), Counter { value: 7 });
        storage.remove("counter").unwrap();
        assert!(storage.read("counter").is_none());
    }

    #[test]
    fn file_storage_round_trip() {
        let dir = std::env::temp_dir().join(format!("tgw-storage-{}", std::process::id()));
        let storage = FileStorage::open(&dir).unwrap();
        save_json(&storage, &Counter { value: 3 });
        assert!(dir.join("counter.json").exists());
        assert!(!dir.join("counter.json.tmp").exists());
        assert_eq!(load_json::<Counter>(&storage), Counter { value: 3 });
        storage.remove("counter").unwrap();
        storage.remove("counter").unwrap();
        assert!(storage.read("counter").is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
