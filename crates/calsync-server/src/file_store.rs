//! JSON file persistence for the cache store and the event index.
//!
//! Layout inside the data directory:
//!
//! - `state.json`: cache timestamps, `{"calsync:last-sync": 1738750000000, ...}`
//! - `index.json`: index entries, `{"calsync:<ref>": {...event...}, ...}`
//!
//! Writes go to a sibling temporary file that is then renamed over the
//! target, so a reader never observes a half-written index.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use calsync_core::CalendarEvent;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::StoreError;
use crate::store::{CacheStore, EventIndex, IndexEntry, MemoryStore, replace_namespace};

/// File name of the timestamp store.
pub const STATE_FILE: &str = "state.json";

/// File name of the event index.
pub const INDEX_FILE: &str = "index.json";

/// A [`MemoryStore`] mirrored to JSON files.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    memory: MemoryStore,
}

impl JsonFileStore {
    /// Opens (or creates) a store in `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Write {
            path: dir.clone(),
            source,
        })?;

        let timestamps: BTreeMap<String, i64> = read_json(&dir.join(STATE_FILE))?;
        let entries: BTreeMap<String, CalendarEvent> = read_json(&dir.join(INDEX_FILE))?;
        debug!(
            dir = %dir.display(),
            timestamps = timestamps.len(),
            entries = entries.len(),
            "Opened store"
        );

        Ok(Self {
            dir,
            memory: MemoryStore::from_parts(timestamps, entries),
        })
    }

    /// Returns the data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }
}

impl CacheStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        self.memory.get(key)
    }

    fn set(&self, key: &str, millis: i64) -> Result<(), StoreError> {
        self.memory.update_timestamps(
            |timestamps| {
                timestamps.insert(key.to_string(), millis);
            },
            |timestamps, _| write_json(&self.state_path(), timestamps),
        )
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.memory.update_timestamps(
            |timestamps| timestamps.remove(key).is_some(),
            |timestamps, removed| {
                if *removed {
                    write_json(&self.state_path(), timestamps)
                } else {
                    Ok(())
                }
            },
        )?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.memory.keys_with_prefix(prefix)
    }
}

impl EventIndex for JsonFileStore {
    fn index_objects(
        &self,
        namespace: &str,
        records: &[CalendarEvent],
    ) -> Result<usize, StoreError> {
        self.memory.update_entries(
            |entries| replace_namespace(entries, namespace, records),
            |entries, _| write_json(&self.index_path(), entries),
        )
    }

    fn query(&self, prefix: &str) -> Result<Vec<IndexEntry>, StoreError> {
        self.memory.query(prefix)
    }

    fn batch_delete(&self, keys: &[String]) -> Result<usize, StoreError> {
        self.memory.update_entries(
            |entries| keys.iter().filter(|key| entries.remove(*key).is_some()).count(),
            |entries, deleted| {
                if *deleted > 0 {
                    write_json(&self.index_path(), entries)
                } else {
                    Ok(())
                }
            },
        )
    }
}

/// Reads a JSON file, treating a missing file as the default value.
fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `value` to `path` through a temporary file and a rename.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");

    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, bytes).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(write_err)?;

    trace!(path = %path.display(), "Persisted store file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("nested")).unwrap();
        assert_eq!(store.get("calsync:last-sync").unwrap(), None);
        assert!(store.query("calsync:").unwrap().is_empty());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            store.set("calsync:last-sync", 1_000).unwrap();
            store
                .index_objects(
                    "calsync",
                    &[CalendarEvent::new("abc").with_summary("Standup")],
                )
                .unwrap();
        }

        let store = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("calsync:last-sync").unwrap(), Some(1_000));
        let entries = store.query("calsync:").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "calsync:abc");
        assert_eq!(entries[0].value.summary.as_deref(), Some("Standup"));
        assert!(!dir.path().join("index.json.tmp").exists());
    }

    #[test]
    fn deletes_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store.set("calsync:watch:abc", 5).unwrap();
        store
            .index_objects("calsync", &[CalendarEvent::new("abc")])
            .unwrap();

        store.delete("calsync:watch:abc").unwrap();
        store.batch_delete(&["calsync:abc".to_string()]).unwrap();

        let reopened = JsonFileStore::open(dir.path()).unwrap();
        assert!(reopened.keys_with_prefix("calsync:").unwrap().is_empty());
        assert!(reopened.query("calsync:").unwrap().is_empty());
    }

    /// A directory squatting on the temporary path makes every write fail.
    fn block_writes(dir: &Path, file: &str) {
        fs::create_dir(dir.join(file).with_extension("json.tmp")).unwrap();
    }

    #[test]
    fn failed_index_write_keeps_previous_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .index_objects("calsync", &[CalendarEvent::new("old")])
            .unwrap();

        block_writes(dir.path(), INDEX_FILE);
        let err = store
            .index_objects("calsync", &[CalendarEvent::new("new")])
            .unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
        let err = store.batch_delete(&["calsync:old".to_string()]).unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));

        let keys: Vec<String> = store
            .query("calsync:")
            .unwrap()
            .into_iter()
            .map(|entry| entry.key)
            .collect();
        assert_eq!(keys, vec!["calsync:old"]);
    }

    #[test]
    fn failed_state_write_keeps_previous_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store.set("calsync:last-sync", 1_000).unwrap();

        block_writes(dir.path(), STATE_FILE);
        assert!(store.set("calsync:last-sync", 2_000).is_err());
        assert!(store.delete("calsync:last-sync").is_err());

        assert_eq!(store.get("calsync:last-sync").unwrap(), Some(1_000));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STATE_FILE), "not json").unwrap();

        let err = JsonFileStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
