//! Core types: sources, event records, canonical dates, tracing.
//!
//! This crate holds everything the sync engine shares between its layers:
//!
//! - [`Source`] and [`validate_sources`] - the source registry
//! - [`CalendarEvent`] - the canonical, indexable event record
//! - [`time`] - canonical date rendering and the injectable [`Clock`]
//! - [`fingerprint`] - stable SHA-256 identities
//! - [`init_tracing`] - logging setup for the binaries

pub mod event;
pub mod hash;
pub mod source;
pub mod time;
pub mod tracing;

pub use event::{CalendarEvent, EVENT_TAG};
pub use hash::{fingerprint, sha256_hex};
pub use source::{
    DEFAULT_CACHE_DURATION, DEFAULT_WATCH_INTERVAL, RejectedSource, Scheme, Source, SourceBatch,
    SyncSettings, validate_sources,
};
pub use time::{Clock, ManualClock, SystemClock, render_date, render_floating, render_instant};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
