//! Errors raised while fetching or parsing a single source.
//!
//! Every variant here is isolated per source by the orchestrator: a
//! [`FetchError`] never aborts a sync pass.

use std::fmt;
use thiserror::Error;

/// What went wrong with a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Connection, DNS, TLS or timeout failure.
    Network,
    /// The server answered with a non-success status.
    Http,
    /// A local file was missing or unreadable.
    File,
    /// The URL scheme is not `http`, `https` or `file`.
    Unsupported,
    /// The calendar text could not be parsed.
    Parse,
}

impl FetchErrorKind {
    /// Returns a stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Http => "http",
            Self::File => "file",
            Self::Unsupported => "unsupported",
            Self::Parse => "parse",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure to obtain events from one source.
#[derive(Debug, Error)]
pub struct FetchError {
    kind: FetchErrorKind,
    detail: String,
    /// HTTP status, for [`FetchErrorKind::Http`].
    status: Option<u16>,
    /// Label of the source that failed.
    source_label: Option<String>,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FetchError {
    /// Creates an error of the given kind.
    pub fn new(kind: FetchErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            status: None,
            source_label: None,
            cause: None,
        }
    }

    /// Creates a network error.
    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Network, detail)
    }

    /// Creates an HTTP status error, e.g. `404 Not Found`.
    pub fn http(status: u16, reason: impl AsRef<str>) -> Self {
        let reason = reason.as_ref();
        let detail = if reason.is_empty() {
            format!("status {}", status)
        } else {
            format!("status {} {}", status, reason)
        };
        let mut err = Self::new(FetchErrorKind::Http, detail);
        err.status = Some(status);
        err
    }

    /// Creates a file error.
    pub fn file(detail: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::File, detail)
    }

    /// Creates an unsupported-scheme error.
    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Unsupported, detail)
    }

    /// Creates a parse error.
    pub fn parse(detail: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Parse, detail)
    }

    /// Attaches the label of the failing source.
    pub fn with_source_label(mut self, label: impl Into<String>) -> Self {
        self.source_label = Some(label.into());
        self
    }

    /// Attaches the underlying error.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    /// Returns the human-readable detail.
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Returns the HTTP status, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the label of the failing source, if set.
    pub fn source_label(&self) -> Option<&str> {
        self.source_label.as_deref()
    }

    /// Returns true if trying again later could plausibly succeed.
    ///
    /// Only used for diagnostics; the fetch adapter never retries.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            FetchErrorKind::Network => true,
            FetchErrorKind::Http => self
                .status
                .is_some_and(|s| s == 429 || (500..600).contains(&s)),
            _ => false,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref label) = self.source_label {
            write!(f, "[{}] ", label)?;
        }
        write!(f, "{} error: {}", self.kind, self.detail)
    }
}

/// Result type for fetch and parse operations.
pub type FetchResult<T> = Result<T, FetchError>;
