//! Durable key-value backends for the persisted state document.
use std::{
    collections::HashMap,
    fs::{self, create_dir_all},
    io::{self, ErrorKind, Write},
    path::PathBuf,
    sync::Mutex,
};

/// Minimal string store; one value per key, replaced wholesale on write.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> io::Result<()>;

    fn describe(&self) -> String;
}

/// Stores each key as `<root>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        create_dir_all(&self.root)?;
        let target = self.path_for(key);
        let staging = self.root.join(format!("{key}.json.tmp"));

        {
            let mut file = fs::File::create(&staging)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&staging, &target)
    }

    fn describe(&self) -> String {
        format!("file store at {}", self.root.display())
    }
}

/// Process-local store used by tests and `--ephemeral` runs.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        store
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| io::Error::other("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| io::Error::other("memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_and_reports_missing_keys() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let store = FileKeyValueStore::new(dir.path().join("nested"));

        assert_eq!(store.get("fairguard_state").unwrap(), None);

        store.set("fairguard_state", "{\"children\":[]}").unwrap();
        store.set("fairguard_state", "{\"children\":[1]}").unwrap();

        assert_eq!(
            store.get("fairguard_state").unwrap().as_deref(),
            Some("{\"children\":[1]}")
        );
        assert!(!dir.path().join("nested/fairguard_state.json.tmp").exists());
    }

    #[test]
    fn memory_store_replaces_values() {
        let store = MemoryKeyValueStore::with_entry("k", "one");
        assert_eq!(store.get("k").unwrap().as_deref(), Some("one"));
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
        assert_eq!(store.get("other").unwrap(), None);
    }
}
