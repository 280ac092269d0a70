//! The sync orchestrator: one pass of fetch, normalize, aggregate, commit.
//!
//! A pass:
//!
//! 1. loads the current settings (no sources: nothing to do)
//! 2. asks the cache gate which sources are due (none: nothing to do)
//! 3. fetches the due sources concurrently, plus any source it holds no
//!    snapshot for, and reuses the last snapshot of every other source
//! 4. replaces the whole indexed set with the aggregate in one write
//! 5. moves the cache timestamps forward
//!
//! A failing source never aborts the pass. Its events are left out and its
//! snapshot is dropped. Only store failures fail the pass.
//!
//! At most one pass (or clear) runs at a time; an overlapping call returns
//! immediately with [`SyncOutcome::AlreadyRunning`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use calsync_core::{CalendarEvent, Clock, Source, SystemClock};
use calsync_providers::{FetchErrorKind, Fetcher, fetch_events};
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::cache_gate::{CacheGate, clear_timestamps};
use crate::error::ServerResult;
use crate::notify::{LogNotifier, Notice, Notifier};
use crate::settings::SettingsProvider;
use crate::store::{CacheStore, EventIndex, namespace_prefix};

/// Namespace under which events are indexed.
pub const DEFAULT_NAMESPACE: &str = "calsync";

/// What started a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A user-requested, cache-gated sync.
    Manual,
    /// A sync that bypasses the global cache.
    Forced,
    /// A background watcher cycle.
    Watch,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Forced => "forced",
            Self::Watch => "watch",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source that failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    /// Source label (name or URL).
    pub source: String,
    pub kind: FetchErrorKind,
    pub message: String,
}

/// Result of a completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Events written to the index.
    pub total_events: usize,
    /// Sources that contributed events, fetched or reused.
    pub success_count: usize,
    /// Sources configured.
    pub total_sources: usize,
    /// Sources fetched successfully in this pass.
    pub fetched: usize,
    /// Sources whose previous events were reused.
    pub reused: usize,
    pub failures: Vec<SourceFailure>,
    /// Whether notices were suppressed for this pass.
    pub silent: bool,
}

impl SyncReport {
    /// Renders the one-line human-readable summary.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Indexed {} {} from {}/{} sources",
            self.total_events,
            if self.total_events == 1 { "event" } else { "events" },
            self.success_count,
            self.total_sources
        );
        if !self.failures.is_empty() {
            let names: Vec<&str> = self.failures.iter().map(|f| f.source.as_str()).collect();
            summary.push_str(&format!("; {} failed: {}", names.len(), names.join(", ")));
        }
        summary
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// What a call to [`Orchestrator::run_sync`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A pass ran and the index was replaced.
    Completed(SyncReport),
    /// Nothing was due; no fetch and no index write happened.
    UpToDate { cache_age: Option<Duration> },
    /// No sources are configured.
    NoSources,
    /// Another pass was in flight.
    AlreadyRunning,
}

impl SyncOutcome {
    /// Returns the report of a completed pass.
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// What a call to [`Orchestrator::clear_all`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// The user declined; nothing changed.
    Cancelled,
    /// Events and cache timestamps were removed.
    Cleared {
        events: usize,
        watch_timestamps: usize,
    },
    /// A pass was in flight; nothing changed.
    AlreadyRunning,
}

/// Events last normalized from a source, together with the source
/// definition they were normalized under.
#[derive(Debug, Clone)]
struct Snapshot {
    source: Source,
    events: Vec<CalendarEvent>,
}

impl Snapshot {
    fn matches(&self, source: &Source) -> bool {
        self.source == *source
    }
}

/// State owned by whichever pass holds the lock.
#[derive(Debug, Default)]
struct PassState {
    /// Keyed by source URL.
    snapshots: HashMap<String, Snapshot>,
}

impl PassState {
    /// Returns the snapshot for `source` if it was taken under the same
    /// definition.
    fn snapshot(&self, source: &Source) -> Option<&Snapshot> {
        self.snapshots
            .get(&source.url)
            .filter(|snapshot| snapshot.matches(source))
    }
}

/// Drives sync passes over the configured sources.
pub struct Orchestrator {
    settings: Arc<dyn SettingsProvider>,
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn CacheStore>,
    index: Arc<dyn EventIndex>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    namespace: String,
    state: Mutex<PassState>,
}

impl Orchestrator {
    /// Creates an orchestrator that logs notices and reads the system clock.
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<dyn CacheStore>,
        index: Arc<dyn EventIndex>,
    ) -> Self {
        Self {
            settings,
            fetcher,
            cache,
            index,
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            namespace: DEFAULT_NAMESPACE.to_string(),
            state: Mutex::new(PassState::default()),
        }
    }

    /// Builder: set the notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Builder: set the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builder: set the index namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Returns the settings provider.
    pub fn settings(&self) -> Arc<dyn SettingsProvider> {
        self.settings.clone()
    }

    /// Returns the index namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Runs one pass.
    ///
    /// Per-source failures are reported inside the outcome. An `Err` means
    /// the pass itself failed (settings or store); it has already been
    /// logged and surfaced as a notice.
    #[instrument(skip_all, fields(trigger = %trigger))]
    pub async fn run_sync(&self, trigger: Trigger) -> ServerResult<SyncOutcome> {
        let Ok(mut state) = self.state.try_lock() else {
            info!("Sync already in progress, skipping");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        let result = self.pass(&mut state, trigger).await;
        if let Err(ref e) = result {
            error!(error = %e, "Sync failed");
            self.notifier
                .notify(&Notice::error("Calendar sync failed", e.to_string()));
        }
        result
    }

    /// Drops the global cache timestamp and every snapshot, then syncs.
    pub async fn force_sync(&self) -> ServerResult<SyncOutcome> {
        self.run_sync(Trigger::Forced).await
    }

    /// Deletes every indexed event and every cache timestamp.
    ///
    /// `confirmed` is the user's answer; `false` aborts with no side effects.
    #[instrument(skip(self))]
    pub async fn clear_all(&self, confirmed: bool) -> ServerResult<ClearOutcome> {
        if !confirmed {
            info!("Clear cancelled");
            return Ok(ClearOutcome::Cancelled);
        }
        let Ok(mut state) = self.state.try_lock() else {
            info!("Sync in progress, not clearing");
            return Ok(ClearOutcome::AlreadyRunning);
        };

        let result = self.clear(&mut state);
        match result {
            Ok(ClearOutcome::Cleared { events, .. }) => {
                self.notifier.notify(&Notice::info(
                    "Calendar events cleared",
                    format!("Removed {} events", events),
                ));
            }
            Err(ref e) => {
                error!(error = %e, "Clear failed");
                self.notifier
                    .notify(&Notice::error("Clearing calendar events failed", e.to_string()));
            }
            Ok(_) => {}
        }
        result
    }

    /// Returns every event currently indexed under this namespace.
    pub fn indexed_events(&self) -> ServerResult<Vec<CalendarEvent>> {
        Ok(self
            .index
            .query(&namespace_prefix(&self.namespace))?
            .into_iter()
            .map(|entry| entry.value)
            .collect())
    }

    async fn pass(&self, state: &mut PassState, trigger: Trigger) -> ServerResult<SyncOutcome> {
        let settings = self.settings.load()?;
        let gate = CacheGate::new(self.cache.clone(), settings.cache_duration);

        if trigger == Trigger::Forced {
            gate.clear_global()?;
            state.snapshots.clear();
        }

        let sources = &settings.sources;
        if sources.is_empty() {
            debug!("No sources configured");
            return Ok(SyncOutcome::NoSources);
        }

        let now = self.clock.now_millis();
        let due = sources
            .iter()
            .map(|source| gate.is_due(source, now))
            .collect::<Result<Vec<bool>, _>>()?;

        if !due.contains(&true) {
            let cache_age = gate.cache_age(now)?;
            info!(?cache_age, "All sources fresh, skipping sync");
            return Ok(SyncOutcome::UpToDate { cache_age });
        }

        // A watcher tick that only found watched sources due stays quiet.
        let silent = trigger == Trigger::Watch
            && sources.len() > 1
            && sources
                .iter()
                .zip(&due)
                .filter(|(_, due)| **due)
                .all(|(source, _)| source.is_watched());

        let plan: Vec<bool> = sources
            .iter()
            .zip(&due)
            .map(|(source, due)| *due || state.snapshot(source).is_none())
            .collect();

        let fetcher = &*self.fetcher;
        let results = join_all(
            sources
                .iter()
                .zip(&plan)
                .filter(|(_, fetch)| **fetch)
                .map(|(source, _)| fetch_events(fetcher, source)),
        )
        .await;
        let mut results = results.into_iter();

        let mut report = SyncReport {
            total_sources: sources.len(),
            silent,
            ..Default::default()
        };
        let mut events = Vec::new();
        let mut snapshots = HashMap::new();
        let mut synced: Vec<&Source> = Vec::new();

        for (source, fetch) in sources.iter().zip(&plan) {
            if !*fetch {
                if let Some(snapshot) = state.snapshot(source) {
                    debug!(
                        source = %source.label(),
                        events = snapshot.events.len(),
                        "Reusing snapshot"
                    );
                    report.reused += 1;
                    events.extend(snapshot.events.iter().cloned());
                    snapshots.insert(source.url.clone(), snapshot.clone());
                }
                continue;
            }

            match results.next() {
                Some(Ok(fetched)) => {
                    info!(source = %source.label(), events = fetched.len(), "Fetched source");
                    report.fetched += 1;
                    events.extend(fetched.iter().cloned());
                    snapshots.insert(
                        source.url.clone(),
                        Snapshot {
                            source: source.clone(),
                            events: fetched,
                        },
                    );
                    synced.push(source);
                }
                Some(Err(e)) => {
                    warn!(source = %source.label(), kind = %e.kind(), error = %e, "Source failed");
                    if !silent {
                        self.notifier
                            .notify(&Notice::error("Calendar source failed", e.to_string()));
                    }
                    report.failures.push(SourceFailure {
                        source: source.label().to_string(),
                        kind: e.kind(),
                        message: e.detail().to_string(),
                    });
                }
                None => {}
            }
        }
        report.success_count = report.fetched + report.reused;

        report.total_events = self.index.index_objects(&self.namespace, &events)?;
        gate.record_pass(synced, now)?;
        state.snapshots = snapshots;

        info!(
            events = report.total_events,
            succeeded = report.success_count,
            total = report.total_sources,
            fetched = report.fetched,
            reused = report.reused,
            failed = report.failures.len(),
            silent,
            "Sync completed"
        );
        if !silent {
            self.notifier
                .notify(&Notice::info("Calendar sync complete", report.summary()));
        }
        Ok(SyncOutcome::Completed(report))
    }

    fn clear(&self, state: &mut PassState) -> ServerResult<ClearOutcome> {
        let keys: Vec<String> = self
            .index
            .query(&namespace_prefix(&self.namespace))?
            .into_iter()
            .map(|entry| entry.key)
            .collect();
        let events = self.index.batch_delete(&keys)?;
        let watch_timestamps = clear_timestamps(self.cache.as_ref())?;
        state.snapshots.clear();

        info!(events, watch_timestamps, "Cleared calendar events");
        Ok(ClearOutcome::Cleared {
            events,
            watch_timestamps,
        })
    }
}
