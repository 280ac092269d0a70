//! Per-source freshness policy.
//!
//! Two kinds of timestamps live in the [`CacheStore`]:
//!
//! - [`GLOBAL_KEY`]: when the regular sources were last synced (the last
//!   full sync)
//! - `calsync:watch:<sha256(url)>`: when one watched file source was last
//!   synced
//!
//! A watched source is gated only by its own timestamp and interval. Every
//! other source is gated by the global timestamp and the cache duration.

use std::sync::Arc;
use std::time::Duration;

use calsync_core::Source;
use calsync_core::time::{duration_millis, elapsed_between};
use tracing::debug;

use crate::error::StoreError;
use crate::store::CacheStore;

/// Key of the global last-sync timestamp.
pub const GLOBAL_KEY: &str = "calsync:last-sync";

/// Prefix of the per-source watch timestamps.
pub const WATCH_KEY_PREFIX: &str = "calsync:watch:";

/// Returns the watch timestamp key for `source`.
pub fn watch_key(source: &Source) -> String {
    format!("{}{}", WATCH_KEY_PREFIX, source.url_hash())
}

/// Decides whether `source` is due for a refetch at `now`.
///
/// `source_last` is only consulted for watched sources, `global_last` only
/// for the others. A missing timestamp always means due.
pub fn should_sync(
    source: &Source,
    global_last: Option<i64>,
    source_last: Option<i64>,
    cache_duration: Duration,
    now: i64,
) -> bool {
    let (last, window) = if source.is_watched() {
        (source_last, source.watch_interval)
    } else {
        (global_last, cache_duration)
    };

    match last {
        None => true,
        Some(last) => now.saturating_sub(last) >= duration_millis(window),
    }
}

/// The cache gate bound to a store.
#[derive(Clone)]
pub struct CacheGate {
    store: Arc<dyn CacheStore>,
    cache_duration: Duration,
}

impl CacheGate {
    /// Creates a gate using `cache_duration` for non-watched sources.
    pub fn new(store: Arc<dyn CacheStore>, cache_duration: Duration) -> Self {
        Self {
            store,
            cache_duration,
        }
    }

    /// Returns the global last-sync timestamp.
    pub fn global_last(&self) -> Result<Option<i64>, StoreError> {
        self.store.get(GLOBAL_KEY)
    }

    /// Returns the individual timestamp of a watched source.
    pub fn source_last(&self, source: &Source) -> Result<Option<i64>, StoreError> {
        if source.is_watched() {
            self.store.get(&watch_key(source))
        } else {
            Ok(None)
        }
    }

    /// Decides whether `source` is due at `now`.
    pub fn is_due(&self, source: &Source, now: i64) -> Result<bool, StoreError> {
        let global_last = self.global_last()?;
        let source_last = self.source_last(source)?;
        let due = should_sync(source, global_last, source_last, self.cache_duration, now);
        debug!(
            source = %source.label(),
            watched = source.is_watched(),
            due,
            "Cache gate decision"
        );
        Ok(due)
    }

    /// Returns how long ago the global sync happened, if ever.
    pub fn cache_age(&self, now: i64) -> Result<Option<Duration>, StoreError> {
        Ok(self.global_last()?.map(|last| elapsed_between(last, now)))
    }

    /// Records a completed pass.
    ///
    /// Each synced watched source gets its own timestamp. The global
    /// timestamp moves only if at least one regular source was synced.
    pub fn record_pass<'a>(
        &self,
        synced: impl IntoIterator<Item = &'a Source>,
        now: i64,
    ) -> Result<(), StoreError> {
        let mut regular_synced = false;
        for source in synced {
            if source.is_watched() {
                self.store.set(&watch_key(source), now)?;
            } else {
                regular_synced = true;
            }
        }
        if regular_synced {
            self.store.set(GLOBAL_KEY, now)?;
        }
        Ok(())
    }

    /// Forgets the global timestamp so every regular source becomes due.
    pub fn clear_global(&self) -> Result<(), StoreError> {
        self.store.delete(GLOBAL_KEY)
    }
}

/// Forgets the global timestamp and every watch timestamp in `store`.
///
/// Returns the number of watch timestamps removed.
pub fn clear_timestamps(store: &dyn CacheStore) -> Result<usize, StoreError> {
    store.delete(GLOBAL_KEY)?;
    let keys = store.keys_with_prefix(WATCH_KEY_PREFIX)?;
    for key in &keys {
        store.delete(key)?;
    }
    Ok(keys.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const HOUR_MS: i64 = 3_600_000;
    const SIX_HOURS: Duration = Duration::from_secs(6 * 3600);

    fn http() -> Source {
        Source::new("https://example.com/work.ics").with_name("Work")
    }

    fn watched() -> Source {
        Source::new("file:///home/me/personal.ics").with_watch(Duration::from_secs(30))
    }

    #[test]
    fn missing_timestamps_are_due() {
        assert!(should_sync(&http(), None, None, SIX_HOURS, 0));
        assert!(should_sync(&watched(), Some(0), None, SIX_HOURS, 0));
    }

    #[test]
    fn regular_source_follows_global_cache() {
        let last = 10 * HOUR_MS;
        assert!(!should_sync(&http(), Some(last), None, SIX_HOURS, last + HOUR_MS));
        assert!(should_sync(&http(), Some(last), None, SIX_HOURS, last + 6 * HOUR_MS));
        // The watch timestamp is irrelevant for regular sources.
        assert!(!should_sync(&http(), Some(last), Some(0), SIX_HOURS, last + 1));
    }

    #[test]
    fn watched_source_ignores_global_cache() {
        let last = 1_000;
        assert!(!should_sync(&watched(), None, Some(last), SIX_HOURS, last + 29_999));
        assert!(should_sync(&watched(), Some(last + 29_999), Some(last), SIX_HOURS, last + 30_000));
    }

    #[test]
    fn watch_flag_on_http_source_is_not_a_watched_source() {
        let mut source = http();
        source.watch = true;
        source.watch_interval = Duration::from_secs(1);
        assert!(!should_sync(&source, Some(0), Some(0), SIX_HOURS, 5_000));
    }

    #[test]
    fn record_pass_updates_the_right_keys() {
        let store = Arc::new(MemoryStore::new());
        let gate = CacheGate::new(store.clone(), SIX_HOURS);

        gate.record_pass([&watched()], 500).unwrap();
        assert_eq!(gate.global_last().unwrap(), None);
        assert_eq!(gate.source_last(&watched()).unwrap(), Some(500));
        assert_eq!(gate.source_last(&http()).unwrap(), None);

        gate.record_pass([&http(), &watched()], 900).unwrap();
        assert_eq!(gate.global_last().unwrap(), Some(900));
        assert_eq!(gate.cache_age(1_900).unwrap(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn clear_timestamps_removes_watch_keys() {
        let store = Arc::new(MemoryStore::new());
        let gate = CacheGate::new(store.clone(), SIX_HOURS);
        gate.record_pass([&http(), &watched()], 900).unwrap();
        store.set("unrelated", 1).unwrap();

        assert_eq!(clear_timestamps(store.as_ref()).unwrap(), 1);
        assert_eq!(gate.global_last().unwrap(), None);
        assert!(gate.is_due(&watched(), 901).unwrap());
        assert_eq!(store.get("unrelated").unwrap(), Some(1));
    }

    #[test]
    fn watch_key_hashes_url() {
        let key = watch_key(&watched());
        assert!(key.starts_with(WATCH_KEY_PREFIX));
        assert_eq!(key.len(), WATCH_KEY_PREFIX.len() + 64);
    }
}
