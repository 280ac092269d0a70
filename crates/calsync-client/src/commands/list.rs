//! List command.

use calsync_core::CalendarEvent;
use calsync_server::Orchestrator;

use crate::error::ClientResult;

/// Prints indexed events sorted by start.
pub fn run(
    orchestrator: &Orchestrator,
    source: Option<&str>,
    limit: Option<usize>,
) -> ClientResult<()> {
    let events = select(orchestrator.indexed_events()?, source, limit);
    if events.is_empty() {
        println!("No events");
        return Ok(());
    }
    for event in &events {
        println!("{}", format_event(event));
    }
    Ok(())
}

/// Filters by source name, sorts by canonical start, then truncates.
///
/// Events without a start sort last.
pub fn select(
    mut events: Vec<CalendarEvent>,
    source: Option<&str>,
    limit: Option<usize>,
) -> Vec<CalendarEvent> {
    if let Some(name) = source {
        events.retain(|e| e.source_name.as_deref() == Some(name));
    }
    events.sort_by(|a, b| match (&a.start, &b.start) {
        (Some(a_start), Some(b_start)) => a_start
            .cmp(b_start)
            .then_with(|| a.display_title().cmp(b.display_title())),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.display_title().cmp(b.display_title()),
    });
    if let Some(limit) = limit {
        events.truncate(limit);
    }
    events
}

/// Renders one event as a single line.
pub fn format_event(event: &CalendarEvent) -> String {
    let mut line = format!(
        "{:<19}  {}",
        event.start.as_deref().unwrap_or("-"),
        event.display_title()
    );
    if let Some(ref location) = event.location {
        line.push_str(&format!(" @ {}", location));
    }
    if let Some(ref name) = event.source_name {
        line.push_str(&format!(" [{}]", name));
    }
    line
}
