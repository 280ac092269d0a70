//! The canonical event record.
//!
//! A [`CalendarEvent`] is what ends up in the host index. Records are built
//! fresh on every sync pass and never mutated afterwards; a successful pass
//! replaces the whole indexed set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminator stored in the `tag` field of every event record.
pub const EVENT_TAG: &str = "calendar-event";

/// A normalized, indexable calendar event.
///
/// Every date-valued field holds a canonical date string (see
/// [`crate::time`]). Properties without a dedicated field are kept in
/// `extra` and serialized inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Stable identity fingerprint.
    #[serde(rename = "ref")]
    pub event_ref: String,

    /// Record kind, always [`EVENT_TAG`].
    pub tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    /// Name of the source this event came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    /// Remaining parsed properties, dates already rendered.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CalendarEvent {
    /// Creates an event record with the given identity and no fields.
    pub fn new(event_ref: impl Into<String>) -> Self {
        Self {
            event_ref: event_ref.into(),
            tag: EVENT_TAG.to_string(),
            uid: None,
            summary: None,
            description: None,
            location: None,
            start: None,
            end: None,
            created: None,
            last_modified: None,
            source_name: None,
            extra: BTreeMap::new(),
        }
    }

    /// Returns the key this record is stored under in `namespace`.
    pub fn index_key(&self, namespace: &str) -> String {
        format!("{}:{}", namespace, self.event_ref)
    }

    /// Returns the summary, or a placeholder when absent or blank.
    pub fn display_title(&self) -> &str {
        self.summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("(No title)")
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the start.
    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    /// Builder method to set the source name.
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }
}
