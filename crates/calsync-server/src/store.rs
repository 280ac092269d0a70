//! Host store interfaces and the in-memory implementation.
//!
//! Two stores back a sync pass:
//!
//! - [`CacheStore`]: epoch-millisecond timestamps keyed by string
//! - [`EventIndex`]: event records keyed by `<namespace>:<ref>`
//!
//! Both are synchronous. Implementations must make
//! [`EventIndex::index_objects`] appear atomic to readers.

use std::collections::BTreeMap;
use std::sync::RwLock;

use calsync_core::CalendarEvent;
use tracing::trace;

use crate::error::StoreError;

/// Key/value store for cache timestamps.
pub trait CacheStore: Send + Sync {
    /// Returns the timestamp stored under `key`.
    fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Stores `millis` under `key`.
    fn set(&self, key: &str, millis: i64) -> Result<(), StoreError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Lists every key starting with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// One stored record and its key.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub key: String,
    pub value: CalendarEvent,
}

/// Object index holding the normalized events.
pub trait EventIndex: Send + Sync {
    /// Replaces every record under `namespace` with `records`.
    ///
    /// Records sharing a `ref` collapse to one entry (the last wins).
    /// Returns the number of entries stored.
    fn index_objects(&self, namespace: &str, records: &[CalendarEvent])
    -> Result<usize, StoreError>;

    /// Returns all entries whose key starts with `prefix`, in key order.
    fn query(&self, prefix: &str) -> Result<Vec<IndexEntry>, StoreError>;

    /// Deletes the given keys and returns how many existed.
    fn batch_delete(&self, keys: &[String]) -> Result<usize, StoreError>;
}

/// Prefix shared by every key of `namespace`.
pub fn namespace_prefix(namespace: &str) -> String {
    format!("{}:", namespace)
}

/// Replaces the `namespace` part of `entries` with `records`.
pub(crate) fn replace_namespace(
    entries: &mut BTreeMap<String, CalendarEvent>,
    namespace: &str,
    records: &[CalendarEvent],
) -> usize {
    let prefix = namespace_prefix(namespace);
    entries.retain(|key, _| !key.starts_with(&prefix));

    let before = entries.len();
    for record in records {
        entries.insert(record.index_key(namespace), record.clone());
    }
    entries.len() - before
}

/// Both stores over `RwLock`-guarded maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    timestamps: RwLock<BTreeMap<String, i64>>,
    entries: RwLock<BTreeMap<String, CalendarEvent>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with the given state.
    pub fn from_parts(
        timestamps: BTreeMap<String, i64>,
        entries: BTreeMap<String, CalendarEvent>,
    ) -> Self {
        Self {
            timestamps: RwLock::new(timestamps),
            entries: RwLock::new(entries),
        }
    }

    /// Applies `change` to a copy of the timestamps and installs the copy
    /// only once `commit` accepts it. The write lock is held throughout.
    pub(crate) fn update_timestamps<R>(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, i64>) -> R,
        commit: impl FnOnce(&BTreeMap<String, i64>, &R) -> Result<(), StoreError>,
    ) -> Result<R, StoreError> {
        staged_update(&self.timestamps, change, commit)
    }

    /// Same as [`MemoryStore::update_timestamps`], for the index entries.
    pub(crate) fn update_entries<R>(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, CalendarEvent>) -> R,
        commit: impl FnOnce(&BTreeMap<String, CalendarEvent>, &R) -> Result<(), StoreError>,
    ) -> Result<R, StoreError> {
        staged_update(&self.entries, change, commit)
    }
}

fn staged_update<T: Clone, R>(
    lock: &RwLock<T>,
    change: impl FnOnce(&mut T) -> R,
    commit: impl FnOnce(&T, &R) -> Result<(), StoreError>,
) -> Result<R, StoreError> {
    let mut current = lock.write().map_err(|_| StoreError::Poisoned)?;
    let mut next = current.clone();
    let out = change(&mut next);
    commit(&next, &out)?;
    *current = next;
    Ok(out)
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let timestamps = self.timestamps.read().map_err(|_| StoreError::Poisoned)?;
        Ok(timestamps.get(key).copied())
    }

    fn set(&self, key: &str, millis: i64) -> Result<(), StoreError> {
        trace!(key = %key, millis, "Setting timestamp");
        let mut timestamps = self.timestamps.write().map_err(|_| StoreError::Poisoned)?;
        timestamps.insert(key.to_string(), millis);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut timestamps = self.timestamps.write().map_err(|_| StoreError::Poisoned)?;
        timestamps.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let timestamps = self.timestamps.read().map_err(|_| StoreError::Poisoned)?;
        Ok(timestamps
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

impl EventIndex for MemoryStore {
    fn index_objects(
        &self,
        namespace: &str,
        records: &[CalendarEvent],
    ) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        Ok(replace_namespace(&mut entries, namespace, records))
    }

    fn query(&self, prefix: &str) -> Result<Vec<IndexEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| IndexEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }

    fn batch_delete(&self, keys: &[String]) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        Ok(keys.iter().filter(|key| entries.remove(*key).is_some()).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_ref: &str, summary: &str) -> CalendarEvent {
        CalendarEvent::new(event_ref).with_summary(summary)
    }

    #[test]
    fn timestamps_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("calsync:last-sync").unwrap(), None);

        store.set("calsync:last-sync", 42).unwrap();
        assert_eq!(store.get("calsync:last-sync").unwrap(), Some(42));

        store.delete("calsync:last-sync").unwrap();
        store.delete("calsync:last-sync").unwrap();
        assert_eq!(store.get("calsync:last-sync").unwrap(), None);
    }

    #[test]
    fn keys_with_prefix_filters() {
        let store = MemoryStore::new();
        store.set("calsync:watch:aaa", 1).unwrap();
        store.set("calsync:watch:bbb", 2).unwrap();
        store.set("calsync:last-sync", 3).unwrap();

        assert_eq!(
            store.keys_with_prefix("calsync:watch:").unwrap(),
            vec!["calsync:watch:aaa", "calsync:watch:bbb"]
        );
    }

    #[test]
    fn index_objects_replaces_whole_namespace() {
        let store = MemoryStore::new();
        store
            .index_objects("calsync", &[event("a", "A"), event("b", "B")])
            .unwrap();
        store.index_objects("other", &[event("x", "X")]).unwrap();

        let stored = store.index_objects("calsync", &[event("c", "C")]).unwrap();
        assert_eq!(stored, 1);

        let keys: Vec<String> = store
            .query("calsync:")
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["calsync:c"]);
        assert_eq!(store.query("other:").unwrap().len(), 1);
    }

    #[test]
    fn duplicate_refs_collapse() {
        let store = MemoryStore::new();
        let stored = store
            .index_objects("calsync", &[event("a", "first"), event("a", "second")])
            .unwrap();
        assert_eq!(stored, 1);

        let entries = store.query("calsync:").unwrap();
        assert_eq!(entries[0].value.summary.as_deref(), Some("second"));
    }

    #[test]
    fn batch_delete_counts_existing_keys() {
        let store = MemoryStore::new();
        store
            .index_objects("calsync", &[event("a", "A"), event("b", "B")])
            .unwrap();

        let deleted = store
            .batch_delete(&["calsync:a".to_string(), "calsync:missing".to_string()])
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.query("calsync:").unwrap().len(), 1);
    }
}
