use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("could not encode value for {key}: {source}")]
    EncodeError {
        key: String,
        source: serde_json::Error,
    },
}

/// Synchronous string key-value store. Every value is JSON text.
///
/// A missing key reads as `None`; callers treat that as empty.
pub trait Store {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Vec<String>;
}

/// Read and decode a JSON value. Missing and undecodable values are `None`.
pub fn read_json<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("ignoring undecodable value at {}: {}", key, e);
            None
        }
    }
}

/// Encode and write a JSON value.
pub fn write_json<T: Serialize>(store: &mut dyn Store, key: &str, value: &T) -> Result<(), StoreError> {
    let text = serde_json::to_string(value).map_err(|e| StoreError::EncodeError {
        key: key.to_string(),
        source: e,
    })?;
    store.set(key, text)
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// The whole key→string map kept as one JSON object on disk.
/// Every write rewrites the file atomically.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store; a corrupt
    /// one is backed up as `.bak` and replaced by an empty store. If the
    /// backup cannot be written the open fails and the file is left alone.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let entries = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| StoreError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })?;
            match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(map) => map,
                Err(e) => {
                    let bak = path.with_extension("json.bak");
                    fs::copy(path, &bak).map_err(|source| StoreError::WriteError {
                        path: bak.clone(),
                        source,
                    })?;
                    warn!(
                        "could not parse {} (backed up as {}): {}",
                        path.display(),
                        bak.display(),
                        e
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(FileStore {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let write_err = |e: io::Error| StoreError::WriteError {
            path: self.path.clone(),
            source: e,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.entries).map_err(|e| StoreError::EncodeError {
            key: self.path.display().to_string(),
            source: e,
        })?;
        atomic_write(&self.path, content.as_bytes()).map_err(write_err)
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        if self.entries.get(key) == Some(&value) {
            return Ok(());
        }
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Write via a temp file in the same directory, then rename over the target.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_basics() {
        let mut store = MemoryStore::new();
        assert!(store.get("a").is_none());
        store.set("a", "1".into()).unwrap();
        store.set("b", "2".into()).unwrap();
        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert_eq!(store.keys(), vec!["a", "b"]);
        store.remove("a").unwrap();
        assert_eq!(store.keys(), vec!["b"]);
    }

    #[test]
    fn file_store_persists_across_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data/store.json");
        {
            let mut store = FileStore::open(&path).unwrap();
            store.set("2024-01-15", "{}".into()).unwrap();
        }
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("2024-01-15").as_deref(), Some("{}"));
    }

    #[test]
    fn corrupt_file_is_backed_up_and_emptied() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json {{{").unwrap();
        let store = FileStore::open(&path).unwrap();
        assert!(store.keys().is_empty());
        assert!(dir.path().join("store.json.bak").exists());
    }

    #[test]
    fn failed_backup_keeps_the_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json {{{").unwrap();
        // a directory in the way makes the copy fail
        fs::create_dir(dir.path().join("store.json.bak")).unwrap();

        let err = FileStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::WriteError { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json {{{");
    }

    #[test]
    fn read_json_treats_garbage_as_missing() {
        let mut store = MemoryStore::new();
        store.set("k", "{oops".into()).unwrap();
        assert!(read_json::<serde_json::Value>(&store, "k").is_none());
        assert!(read_json::<serde_json::Value>(&store, "missing").is_none());
    }

    #[test]
    fn write_json_round_trips() {
        let mut store = MemoryStore::new();
        write_json(&mut store, "k", &vec![1, 2, 3]).unwrap();
        assert_eq!(read_json::<Vec<i32>>(&store, "k"), Some(vec![1, 2, 3]));
    }
}
