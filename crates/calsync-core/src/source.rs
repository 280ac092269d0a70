//! Calendar sources and the source registry.
//!
//! Sources arrive from configuration as untyped values. [`validate_sources`]
//! keeps every entry that is a record with a string `url` and drops the rest,
//! reporting each rejection instead of failing: an empty or missing source
//! list simply means there is nothing to sync.

use std::fmt;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::hash::sha256_hex;

/// Re-check interval for watched sources that do not set one.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(30);

/// How long a full sync stays fresh when the configuration does not say.
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(6 * 60 * 60);

/// The URL scheme of a source, which selects how it is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
    /// A local file.
    File,
    /// Anything else, including URLs that do not parse.
    Unsupported,
}

impl Scheme {
    /// Classifies a URL string.
    pub fn of(url: &str) -> Self {
        match Url::parse(url) {
            Ok(parsed) => match parsed.scheme() {
                "http" => Self::Http,
                "https" => Self::Https,
                "file" => Self::File,
                _ => Self::Unsupported,
            },
            Err(_) => Self::Unsupported,
        }
    }

    /// Returns true for `http` and `https`.
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }

    /// Returns the scheme name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::File => "file",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured calendar feed.
#[derive(Clone, PartialEq, Eq)]
pub struct Source {
    /// Location of the calendar (`http`, `https` or `file` URL).
    pub url: String,
    /// Display label, copied onto every event from this source.
    pub name: Option<String>,
    /// Basic auth user name (HTTP only).
    pub username: Option<String>,
    /// Basic auth password (HTTP only).
    pub password: Option<String>,
    /// Periodic re-check requested. Only honoured for `file` sources.
    pub watch: bool,
    /// Re-check interval for watched sources.
    pub watch_interval: Duration,
}

impl Source {
    /// Creates a source for `url` with no options set.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            username: None,
            password: None,
            watch: false,
            watch_interval: DEFAULT_WATCH_INTERVAL,
        }
    }

    /// Builder method to set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder method to set Basic auth credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Builder method to enable watching at the given interval.
    pub fn with_watch(mut self, interval: Duration) -> Self {
        self.watch = true;
        self.watch_interval = interval;
        self
    }

    /// Returns the URL scheme.
    pub fn scheme(&self) -> Scheme {
        Scheme::of(&self.url)
    }

    /// Returns true if this is a `file` source with watching enabled.
    pub fn is_watched(&self) -> bool {
        self.watch && self.scheme() == Scheme::File
    }

    /// Returns the credentials when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// Returns the name if set, otherwise the URL.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }

    /// Returns the SHA-256 of the URL, used to key per-source cache state.
    pub fn url_hash(&self) -> String {
        sha256_hex(&self.url)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("url", &self.url)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("watch", &self.watch)
            .field("watch_interval", &self.watch_interval)
            .finish()
    }
}

/// A configuration entry the registry refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedSource {
    /// Position of the entry in the configured list.
    pub index: usize,
    /// Why the entry was dropped.
    pub reason: String,
}

/// Result of validating a configured source list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceBatch {
    /// Well-formed sources, in configuration order.
    pub sources: Vec<Source>,
    /// Entries that were dropped.
    pub rejected: Vec<RejectedSource>,
}

/// Validates raw source configuration.
///
/// `raw` may be the whole configuration object (its `sources` member is
/// used), the source list itself, or null. Anything else yields an empty
/// batch. Never fails.
pub fn validate_sources(raw: &Value) -> SourceBatch {
    let entries = match raw {
        Value::Null => return SourceBatch::default(),
        Value::Array(entries) => entries.as_slice(),
        Value::Object(map) => match map.get("sources") {
            Some(Value::Array(entries)) => entries.as_slice(),
            Some(Value::Null) | None => return SourceBatch::default(),
            Some(other) => {
                warn!(kind = value_kind(other), "`sources` is not a list, ignoring");
                return SourceBatch::default();
            }
        },
        other => {
            warn!(kind = value_kind(other), "Source configuration is not a record or list");
            return SourceBatch::default();
        }
    };

    let mut batch = SourceBatch::default();
    for (index, entry) in entries.iter().enumerate() {
        match parse_entry(entry) {
            Ok(source) => batch.sources.push(source),
            Err(reason) => {
                warn!(index, reason = %reason, "Ignoring malformed source entry");
                batch.rejected.push(RejectedSource { index, reason });
            }
        }
    }
    debug!(
        accepted = batch.sources.len(),
        rejected = batch.rejected.len(),
        "Validated source configuration"
    );
    batch
}

fn parse_entry(entry: &Value) -> Result<Source, String> {
    let Value::Object(map) = entry else {
        return Err(format!("expected a record, found {}", value_kind(entry)));
    };

    let url = match map.get("url") {
        Some(Value::String(url)) if !url.trim().is_empty() => url.trim().to_string(),
        Some(Value::String(_)) => return Err("`url` is empty".to_string()),
        Some(other) => return Err(format!("`url` must be a string, found {}", value_kind(other))),
        None => return Err("missing `url`".to_string()),
    };

    let mut source = Source::new(url);
    source.name = string_field(map, &["name"]);
    source.username = string_field(map, &["username"]);
    source.password = string_field(map, &["password"]);
    source.watch = map.get("watch").and_then(Value::as_bool).unwrap_or(false);

    if let Some(raw) = field(map, &["watch_interval", "watchInterval"]) {
        match raw.as_u64().filter(|secs| *secs > 0) {
            Some(secs) => source.watch_interval = Duration::from_secs(secs),
            None => warn!(
                source = %source.url,
                value = %raw,
                default_secs = DEFAULT_WATCH_INTERVAL.as_secs(),
                "Invalid watch interval, using default"
            ),
        }
    }

    if source.watch && source.scheme() != Scheme::File {
        warn!(source = %source.url, "`watch` is only supported for file sources, ignoring");
    }
    if source.credentials().is_some() && !source.scheme().is_http() {
        debug!(source = %source.url, "Credentials ignored for non-HTTP source");
    }

    Ok(source)
}

fn field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| map.get(*key))
}

fn string_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    field(map, keys).and_then(Value::as_str).map(str::to_string)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "record",
    }
}

/// Validated sync settings, as read at the start of each pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Sources accepted by the registry.
    pub sources: Vec<Source>,
    /// How long a full sync stays fresh.
    pub cache_duration: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            cache_duration: DEFAULT_CACHE_DURATION,
        }
    }
}

impl SyncSettings {
    /// Creates settings with the default cache duration.
    pub fn new(sources: Vec<Source>) -> Self {
        Self {
            sources,
            ..Default::default()
        }
    }

    /// Builder method to set the cache duration.
    pub fn with_cache_duration(mut self, cache_duration: Duration) -> Self {
        self.cache_duration = cache_duration;
        self
    }

    /// Builds settings from a raw configuration object.
    ///
    /// Reads `sources` through [`validate_sources`] and `cache_duration`
    /// (or `cacheDuration`) in seconds.
    pub fn from_config(raw: &Value) -> Self {
        let sources = validate_sources(raw).sources;
        let cache_duration = raw
            .as_object()
            .and_then(|map| field(map, &["cache_duration", "cacheDuration"]))
            .and_then(|value| {
                let secs = value.as_u64();
                if secs.is_none() {
                    warn!(value = %value, "Invalid cache duration, using default");
                }
                secs
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_DURATION);

        Self {
            sources,
            cache_duration,
        }
    }

    /// Returns the sources with watching in effect.
    pub fn watched(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter().filter(|s| s.is_watched())
    }

    /// Returns the shortest watch interval, if any source is watched.
    pub fn min_watch_interval(&self) -> Option<Duration> {
        self.watched().map(|s| s.watch_interval).min()
    }
}
