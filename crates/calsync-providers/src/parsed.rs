//! Parsed calendar events, before normalization.
//!
//! A [`ParsedEvent`] is what the iCalendar parser produces: the handful of
//! well-known fields plus every other property as a [`ParsedValue`] tree.
//! Date values keep their original representation here; collapsing them to
//! canonical strings is the normalizer's job.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// A date or date-time as written in the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateValue {
    /// An all-day date (`VALUE=DATE`).
    Date(NaiveDate),
    /// Wall-clock time with no zone.
    Floating(NaiveDateTime),
    /// An absolute UTC instant (`...Z`).
    Utc(DateTime<Utc>),
    /// Wall-clock time in a named zone (`TZID=...`).
    Zoned {
        date_time: NaiveDateTime,
        tzid: String,
    },
}

impl DateValue {
    /// Returns true for all-day dates.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }
}

/// A date together with the property text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDate {
    /// The interpreted value.
    pub value: DateValue,
    /// The property value exactly as it appeared, e.g. `20250205T100000Z`.
    pub raw: String,
}

impl ParsedDate {
    /// Creates a parsed date.
    pub fn new(value: DateValue, raw: impl Into<String>) -> Self {
        Self {
            value,
            raw: raw.into(),
        }
    }
}

/// A generic property value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    /// A date carrying its source text.
    DateWithMeta(ParsedDate),
    Text(String),
    Integer(i64),
    Float(f64),
    Null,
    List(Vec<ParsedValue>),
    Map(BTreeMap<String, ParsedValue>),
}

impl ParsedValue {
    /// Convenience constructor for text.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

/// One VEVENT as produced by the parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedEvent {
    pub uid: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<ParsedDate>,
    pub end: Option<ParsedDate>,
    pub created: Option<ParsedDate>,
    pub last_modified: Option<ParsedDate>,
    /// All remaining properties, keyed by lowercase property name.
    pub properties: BTreeMap<String, ParsedValue>,
}

impl ParsedEvent {
    /// Creates an empty event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the UID.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the start.
    pub fn with_start(mut self, start: ParsedDate) -> Self {
        self.start = Some(start);
        self
    }

    /// Builder method to set the end.
    pub fn with_end(mut self, end: ParsedDate) -> Self {
        self.end = Some(end);
        self
    }

    /// Builder method to add a generic property.
    pub fn with_property(mut self, name: impl Into<String>, value: ParsedValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}
