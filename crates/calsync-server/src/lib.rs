//! Sync engine: cache gate, orchestrator, watcher, stores.
//!
//! This crate turns configured calendar sources into one indexed event set:
//! - Freshness decisions per source ([`CacheGate`])
//! - Sync passes with per-source failure isolation ([`Orchestrator`])
//! - Periodic passes over local file sources ([`Watcher`])
//! - Timestamp and index persistence ([`MemoryStore`], [`JsonFileStore`])
//! - User notices ([`DesktopNotifier`], [`LogNotifier`])
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use calsync_core::{Source, SyncSettings};
//! use calsync_providers::Fetcher;
//! use calsync_server::{JsonFileStore, Orchestrator, StaticSettings, Trigger};
//!
//! # async fn run(fetcher: Arc<dyn Fetcher>) -> Result<(), Box<dyn std::error::Error>> {
//! let settings = SyncSettings::new(vec![Source::new("https://example.com/work.ics")]);
//! let store = Arc::new(JsonFileStore::open("/tmp/calsync")?);
//! let orchestrator = Orchestrator::new(
//!     Arc::new(StaticSettings::new(settings)),
//!     fetcher,
//!     store.clone(),
//!     store,
//! );
//! let outcome = orchestrator.run_sync(Trigger::Manual).await?;
//! # Ok(())
//! # }
//! ```

mod cache_gate;
mod error;
mod file_store;
mod notify;
mod orchestrator;
mod settings;
mod store;
mod watcher;

#[cfg(test)]
mod test_support;

pub use cache_gate::{
    CacheGate, GLOBAL_KEY, WATCH_KEY_PREFIX, clear_timestamps, should_sync, watch_key,
};
pub use error::{ServerError, ServerResult, StoreError};
pub use file_store::{INDEX_FILE, JsonFileStore, STATE_FILE};
pub use notify::{DesktopNotifier, LogNotifier, Notice, NoticeLevel, Notifier, RecordingNotifier};
pub use orchestrator::{
    ClearOutcome, DEFAULT_NAMESPACE, Orchestrator, SourceFailure, SyncOutcome, SyncReport, Trigger,
};
pub use settings::{SettingsProvider, StaticSettings};
pub use store::{CacheStore, EventIndex, IndexEntry, MemoryStore, namespace_prefix};
pub use watcher::{Cycle, Watcher, WatcherCommand, WatcherConfig, WatcherHandle};
