//! ParsedEvent to CalendarEvent conversion.
//!
//! Normalization does two things:
//!
//! 1. derives the stable identity (`ref`) of each event
//! 2. collapses every date value, however deeply nested, to the canonical
//!    string form of [`calsync_core::time`]
//!
//! Date-times that name an absolute instant (UTC or offset-bearing) are
//! converted to wall-clock time in the target zone. Floating and
//! TZID-qualified values are rendered as written.

use std::sync::LazyLock;

use calsync_core::{CalendarEvent, Source, fingerprint, render_date, render_floating, render_instant};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use regex::Regex;
use serde_json::{Map, Number, Value};
use tracing::{debug, instrument};

use crate::error::FetchResult;
use crate::fetch::Fetcher;
use crate::ics::parse_calendar;
use crate::parsed::{DateValue, ParsedDate, ParsedEvent, ParsedValue};

static ISO_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?$")
        .expect("Invalid ISO date-time regex")
});

/// Computes the stable identity of an event.
///
/// The fingerprint covers the raw DTSTART text followed by the UID, falling
/// back to the summary and then to nothing. Blank values count as missing.
/// Instances of one recurring
/// series share a UID but differ in start, so they get distinct refs.
pub fn event_ref(event: &ParsedEvent) -> String {
    let start = event.start.as_ref().map(|d| d.raw.as_str()).unwrap_or("");
    let identity = present(&event.uid)
        .or_else(|| present(&event.summary))
        .unwrap_or("");
    fingerprint([start, identity])
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Normalizes one event, rendering date-times in the local timezone.
pub fn normalize_event(event: &ParsedEvent, source: &Source) -> CalendarEvent {
    normalize_event_in(event, source, &Local)
}

/// Normalizes one event, rendering date-times in `tz`.
pub fn normalize_event_in<Tz: TimeZone>(
    event: &ParsedEvent,
    source: &Source,
    tz: &Tz,
) -> CalendarEvent {
    let render = |date: &Option<ParsedDate>| date.as_ref().map(|d| render_date_value(&d.value, tz));

    let mut record = CalendarEvent::new(event_ref(event));
    record.uid = event.uid.clone();
    record.summary = event.summary.clone();
    record.description = event.description.clone();
    record.location = event.location.clone();
    record.start = render(&event.start);
    record.end = render(&event.end);
    record.created = render(&event.created);
    record.last_modified = render(&event.last_modified);
    record.source_name = source.name.clone();
    record.extra = event
        .properties
        .iter()
        .map(|(key, value)| (key.clone(), normalize_value(value, tz)))
        .collect();
    record
}

/// Normalizes every event of a calendar.
pub fn normalize_events(events: &[ParsedEvent], source: &Source) -> Vec<CalendarEvent> {
    events.iter().map(|e| normalize_event(e, source)).collect()
}

/// Fetches, parses and normalizes one source.
///
/// Parse failures carry the source label like fetch failures do.
#[instrument(skip_all, fields(source = %source.label()))]
pub async fn fetch_events<F>(fetcher: &F, source: &Source) -> FetchResult<Vec<CalendarEvent>>
where
    F: Fetcher + ?Sized,
{
    let text = fetcher.fetch(source).await?;
    let parsed = parse_calendar(&text).map_err(|e| e.with_source_label(source.label()))?;
    let events = normalize_events(&parsed, source);
    debug!(events = events.len(), "Normalized source");
    Ok(events)
}

/// Converts a parsed value tree to JSON, rendering dates on the way.
///
/// Branch order matters: date wrappers are checked before generic mappings
/// and date-looking strings before plain text.
pub fn normalize_value<Tz: TimeZone>(value: &ParsedValue, tz: &Tz) -> Value {
    match value {
        ParsedValue::DateWithMeta(date) => Value::String(render_date_value(&date.value, tz)),
        ParsedValue::Text(text) => match render_iso_string(text, tz) {
            Some(rendered) => Value::String(rendered),
            None => Value::String(text.clone()),
        },
        ParsedValue::List(items) => {
            Value::Array(items.iter().map(|item| normalize_value(item, tz)).collect())
        }
        ParsedValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), normalize_value(v, tz)))
                .collect::<Map<String, Value>>(),
        ),
        ParsedValue::Integer(n) => Value::Number((*n).into()),
        ParsedValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        ParsedValue::Null => Value::Null,
    }
}

fn render_date_value<Tz: TimeZone>(value: &DateValue, tz: &Tz) -> String {
    match value {
        DateValue::Date(date) => render_date(*date),
        DateValue::Floating(date_time) => render_floating(*date_time),
        DateValue::Zoned { date_time, .. } => render_floating(*date_time),
        DateValue::Utc(instant) => render_instant(instant, tz),
    }
}

/// Renders an ISO-8601 date-time string, or `None` if `text` is not one.
fn render_iso_string<Tz: TimeZone>(text: &str, tz: &Tz) -> Option<String> {
    if !ISO_DATETIME.is_match(text) {
        return None;
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(render_instant(&instant, tz));
    }
    if let Ok(instant) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(render_instant(&instant, tz));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(render_floating)
}
