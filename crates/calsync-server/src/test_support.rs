//! Test doubles shared by the orchestrator and watcher tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use calsync_core::{ManualClock, Source, SyncSettings};
use calsync_providers::{BoxFuture, FetchError, FetchResult, Fetcher};

use crate::notify::RecordingNotifier;
use crate::orchestrator::Orchestrator;
use crate::settings::StaticSettings;
use crate::store::{EventIndex, MemoryStore};

/// 2025-02-05T10:00:00Z
pub const T0: i64 = 1_738_749_600_000;

/// Builds an iCalendar document with one VEVENT per `(uid, dtstart)`.
pub fn calendar(events: &[(&str, &str)]) -> String {
    let mut ics = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//Test//EN\r\n");
    for (uid, start) in events {
        ics.push_str(&format!(
            "BEGIN:VEVENT\r\nUID:{uid}\r\nDTSTART:{start}\r\nSUMMARY:Event {uid}\r\nEND:VEVENT\r\n"
        ));
    }
    ics.push_str("END:VCALENDAR\r\n");
    ics
}

/// Serves canned calendars by URL and records every fetch.
///
/// URLs without a calendar fail with a network error.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    calendars: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn serve(&self, url: &str, ics: String) {
        self.calendars.lock().unwrap().insert(url.to_string(), ics);
    }

    pub fn fail(&self, url: &str) {
        self.calendars.lock().unwrap().remove(url);
    }

    /// Returns and clears the URLs fetched so far.
    pub fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl Fetcher for FakeFetcher {
    fn fetch<'a>(&'a self, source: &'a Source) -> BoxFuture<'a, FetchResult<String>> {
        self.calls.lock().unwrap().push(source.url.clone());
        let body = self.calendars.lock().unwrap().get(&source.url).cloned();
        let label = source.label().to_string();
        Box::pin(async move {
            body.ok_or_else(|| FetchError::network("connection refused").with_source_label(label))
        })
    }
}

pub fn http_source() -> Source {
    Source::new("https://example.com/work.ics").with_name("Work")
}

pub fn watched_source() -> Source {
    Source::new("file:///home/me/personal.ics")
        .with_name("Personal")
        .with_watch(Duration::from_secs(30))
}

/// An orchestrator wired to in-memory doubles.
pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub fetcher: Arc<FakeFetcher>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub settings: Arc<StaticSettings>,
}

impl Harness {
    pub fn new(sources: Vec<Source>) -> Self {
        let fetcher = Arc::new(FakeFetcher::default());
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualClock::new(T0));
        let settings = Arc::new(StaticSettings::new(SyncSettings::new(sources)));

        let orchestrator = Orchestrator::new(
            settings.clone(),
            fetcher.clone(),
            store.clone(),
            store.clone(),
        )
        .with_notifier(notifier.clone())
        .with_clock(clock.clone());

        Self {
            orchestrator: Arc::new(orchestrator),
            fetcher,
            store,
            notifier,
            clock,
            settings,
        }
    }

    /// Returns the indexed refs, in key order.
    pub fn indexed_refs(&self) -> Vec<String> {
        self.store
            .query("calsync:")
            .unwrap()
            .into_iter()
            .map(|entry| entry.value.event_ref)
            .collect()
    }

    /// Returns the indexed summaries, sorted.
    pub fn indexed_summaries(&self) -> Vec<String> {
        let mut summaries: Vec<String> = self
            .store
            .query("calsync:")
            .unwrap()
            .into_iter()
            .filter_map(|entry| entry.value.summary)
            .collect();
        summaries.sort();
        summaries
    }
}
