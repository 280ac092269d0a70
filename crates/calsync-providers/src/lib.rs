//! Calendar source fetching, parsing and normalization.
//!
//! This crate turns a configured [`Source`](calsync_core::Source) into
//! canonical [`CalendarEvent`](calsync_core::CalendarEvent) records:
//!
//! - [`Transport`] - raw HTTP GET and file reads, swappable in tests
//! - [`SourceFetcher`] - the fetch adapter (scheme dispatch, Basic auth)
//! - [`parse_calendar`] - iCalendar text to [`ParsedEvent`]s
//! - [`normalize_event`] - identity derivation and date rendering
//! - [`FetchError`] - per-source failures
//!
//! # Pipeline
//!
//! ```text
//!   Source ──fetch──▶ text ──parse_calendar──▶ ParsedEvent ──normalize──▶ CalendarEvent
//!          (Transport)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use calsync_providers::{ReqwestTransport, SourceFetcher, fetch_events};
//!
//! let fetcher = SourceFetcher::new(ReqwestTransport::new()?);
//! let events = fetch_events(&fetcher, &source).await?;
//! ```

pub mod auth;
pub mod error;
pub mod fetch;
pub mod ics;
pub mod normalize;
pub mod parsed;
pub mod transport;

pub use error::{FetchError, FetchErrorKind, FetchResult};
pub use fetch::{Fetcher, SourceFetcher};
pub use ics::parse_calendar;
pub use normalize::{event_ref, fetch_events, normalize_event, normalize_event_in, normalize_events};
pub use parsed::{DateValue, ParsedDate, ParsedEvent, ParsedValue};
#[cfg(feature = "http")]
pub use transport::ReqwestTransport;
pub use transport::{BoxFuture, HttpResponse, Transport, TransportError};
