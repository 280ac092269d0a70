//! iCalendar parsing.
//!
//! Turns raw `text/calendar` content into [`ParsedEvent`]s. Every VEVENT is
//! returned, including each stored instance of a recurring series; nothing
//! is expanded from RRULE.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use icalendar::parser::{Component, Property, read_calendar, unfold};
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};
use crate::parsed::{DateValue, ParsedDate, ParsedEvent, ParsedValue};

const DATE_FORMAT: &str = "%Y%m%d";
const DATETIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Properties whose values are dates even though they are not mapped onto
/// a dedicated [`ParsedEvent`] field.
const DATE_PROPERTIES: &[&str] = &[
    "DTSTAMP",
    "RECURRENCE-ID",
    "DUE",
    "COMPLETED",
    "EXDATE",
    "RDATE",
];

/// Parameters consumed while interpreting the value itself.
const VALUE_PARAMS: &[&str] = &["VALUE", "TZID"];

/// Parses calendar text into events.
///
/// Fails with a parse error if the text is not an iCalendar object.
pub fn parse_calendar(text: &str) -> FetchResult<Vec<ParsedEvent>> {
    let text = text.trim_start_matches('\u{feff}').trim_start();
    let looks_like_calendar = text
        .get(..15)
        .is_some_and(|head| head.eq_ignore_ascii_case("BEGIN:VCALENDAR"));
    if !looks_like_calendar {
        return Err(FetchError::parse("content is not an iCalendar object"));
    }

    let unfolded = unfold(text);
    let calendar = read_calendar(&unfolded)
        .map_err(|e| FetchError::parse(format!("invalid iCalendar data: {}", e)))?;

    let events: Vec<ParsedEvent> = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .map(parse_event)
        .collect();

    debug!(events = events.len(), "Parsed calendar");
    Ok(events)
}

fn parse_event(component: &Component<'_>) -> ParsedEvent {
    let mut event = ParsedEvent::new();
    let mut others: BTreeMap<String, Vec<ParsedValue>> = BTreeMap::new();

    for property in &component.properties {
        let name = property.name.as_ref().to_ascii_uppercase();
        // TEXT values arrive unescaped from the parser.
        let raw = property.val.as_ref();

        match name.as_str() {
            "UID" => event.uid = non_blank(raw.trim()),
            "SUMMARY" => event.summary = non_blank(raw),
            "DESCRIPTION" => event.description = Some(raw.to_string()),
            "LOCATION" => event.location = Some(raw.to_string()),
            "DTSTART" | "DTEND" | "CREATED" | "LAST-MODIFIED" => match parse_property_date(property)
            {
                Some(date) => {
                    let slot = match name.as_str() {
                        "DTSTART" => &mut event.start,
                        "DTEND" => &mut event.end,
                        "CREATED" => &mut event.created,
                        _ => &mut event.last_modified,
                    };
                    *slot = Some(date);
                }
                None => {
                    warn!(property = %name, value = %raw, "Unparseable date, keeping text");
                    others
                        .entry(name.to_ascii_lowercase())
                        .or_default()
                        .push(ParsedValue::text(raw));
                }
            },
            _ => others
                .entry(name.to_ascii_lowercase())
                .or_default()
                .push(property_value(&name, property)),
        }
    }

    // Repeated properties (ATTENDEE, EXDATE, ...) collapse into a list.
    event.properties = others
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                ParsedValue::List(values)
            };
            (key, value)
        })
        .collect();
    event
}

fn property_value(name: &str, property: &Property<'_>) -> ParsedValue {
    let raw = property.val.as_ref();

    let value = if DATE_PROPERTIES.contains(&name) {
        parse_date_list(property).unwrap_or_else(|| ParsedValue::text(raw))
    } else {
        match name {
            "CATEGORIES" | "RESOURCES" => {
                ParsedValue::List(split_list(raw).into_iter().map(ParsedValue::Text).collect())
            }
            "SEQUENCE" | "PRIORITY" | "PERCENT-COMPLETE" => raw
                .trim()
                .parse::<i64>()
                .map(ParsedValue::Integer)
                .unwrap_or_else(|_| ParsedValue::text(raw)),
            "GEO" => parse_geo(raw).unwrap_or_else(|| ParsedValue::text(raw)),
            _ => ParsedValue::text(raw),
        }
    };

    let params: BTreeMap<String, ParsedValue> = property
        .params
        .iter()
        .filter(|p| {
            !VALUE_PARAMS
                .iter()
                .any(|k| p.key.as_ref().eq_ignore_ascii_case(k))
        })
        .map(|p| {
            let value = p
                .val
                .as_ref()
                .map(|v| ParsedValue::text(v.to_string()))
                .unwrap_or(ParsedValue::Null);
            (p.key.as_ref().to_ascii_lowercase(), value)
        })
        .collect();

    if params.is_empty() {
        value
    } else {
        ParsedValue::Map(BTreeMap::from([
            ("value".to_string(), value),
            ("params".to_string(), ParsedValue::Map(params)),
        ]))
    }
}

fn param<'p>(property: &'p Property<'_>, key: &str) -> Option<&'p str> {
    property
        .params
        .iter()
        .find(|p| p.key.as_ref().eq_ignore_ascii_case(key))
        .and_then(|p| p.val.as_ref())
        .map(|v| v.as_ref())
}

fn is_date_only(property: &Property<'_>) -> bool {
    param(property, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
}

fn parse_property_date(property: &Property<'_>) -> Option<ParsedDate> {
    let raw = property.val.as_ref().trim();
    let value = parse_date_value(raw, param(property, "TZID"), is_date_only(property))?;
    Some(ParsedDate::new(value, raw))
}

/// Parses a comma-separated date property such as EXDATE.
///
/// Returns `None` if any element fails, so the caller can keep the text.
fn parse_date_list(property: &Property<'_>) -> Option<ParsedValue> {
    let tzid = param(property, "TZID");
    let date_only = is_date_only(property);

    let mut dates = property
        .val
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|raw| {
            parse_date_value(raw, tzid, date_only).map(|value| ParsedDate::new(value, raw))
        })
        .collect::<Option<Vec<_>>>()?;

    match dates.len() {
        0 => None,
        1 => dates.pop().map(ParsedValue::DateWithMeta),
        _ => Some(ParsedValue::List(
            dates.into_iter().map(ParsedValue::DateWithMeta).collect(),
        )),
    }
}

/// Interprets one iCalendar date or date-time value.
pub fn parse_date_value(raw: &str, tzid: Option<&str>, date_only: bool) -> Option<DateValue> {
    let raw = raw.trim();

    if date_only || (raw.len() == 8 && raw.chars().all(|c| c.is_ascii_digit())) {
        return NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .ok()
            .map(DateValue::Date);
    }

    if let Some(utc) = raw.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, DATETIME_FORMAT)
            .ok()
            .map(|dt| DateValue::Utc(dt.and_utc()));
    }

    let naive = NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT).ok()?;
    Some(match tzid {
        Some(tzid) => DateValue::Zoned {
            date_time: naive,
            tzid: tzid.to_string(),
        },
        None => DateValue::Floating(naive),
    })
}

fn parse_geo(raw: &str) -> Option<ParsedValue> {
    let (lat, lon) = raw.split_once(';')?;
    let lat = lat.trim().parse::<f64>().ok()?;
    let lon = lon.trim().parse::<f64>().ok()?;
    Some(ParsedValue::Map(BTreeMap::from([
        ("latitude".to_string(), ParsedValue::Float(lat)),
        ("longitude".to_string(), ParsedValue::Float(lon)),
    ])))
}

/// Splits a comma-separated TEXT list.
///
/// The parser has already resolved `\,` escapes, so an escaped comma
/// inside an item is indistinguishable from a separator here.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(raw: &str) -> Option<String> {
    (!raw.trim().is_empty()).then(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;

    fn sample_ics() -> &'static str {
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Test//Test//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:test-event-1@example.com\r\n\
         DTSTAMP:20250201T090000Z\r\n\
         DTSTART:20250205T100000Z\r\n\
         DTEND:20250205T110000Z\r\n\
         SUMMARY:Team Meeting\r\n\
         DESCRIPTION:Weekly sync\\, bring notes\\nSecond line\r\n\
         LOCATION:Conference Room A\r\n\
         STATUS:CONFIRMED\r\n\
         SEQUENCE:2\r\n\
         END:VEVENT\r\n\
         BEGIN:VEVENT\r\n\
         UID:all-day@example.com\r\n\
         DTSTART;VALUE=DATE:20250210\r\n\
         DTEND;VALUE=DATE:20250211\r\n\
         SUMMARY:Holiday\r\n\
         CATEGORIES:Vacation,Family\\, friends\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    }

    #[test]
    fn parses_basic_fields() {
        let events = parse_calendar(sample_ics()).unwrap();
        assert_eq!(events.len(), 2);

        let meeting = &events[0];
        assert_eq!(meeting.uid.as_deref(), Some("test-event-1@example.com"));
        assert_eq!(meeting.summary.as_deref(), Some("Team Meeting"));
        assert_eq!(
            meeting.description.as_deref(),
            Some("Weekly sync, bring notes\nSecond line")
        );
        assert_eq!(meeting.location.as_deref(), Some("Conference Room A"));

        let start = meeting.start.as_ref().unwrap();
        assert_eq!(start.raw, "20250205T100000Z");
        match &start.value {
            DateValue::Utc(dt) => {
                assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2025-02-05 10:00")
            }
            other => panic!("expected UTC date-time, got {:?}", other),
        }

        assert_eq!(
            meeting.properties.get("status"),
            Some(&ParsedValue::text("CONFIRMED"))
        );
        assert_eq!(
            meeting.properties.get("sequence"),
            Some(&ParsedValue::Integer(2))
        );
        assert!(matches!(
            meeting.properties.get("dtstamp"),
            Some(ParsedValue::DateWithMeta(_))
        ));
    }

    #[test]
    fn parses_all_day_dates_and_categories() {
        let events = parse_calendar(sample_ics()).unwrap();
        let holiday = &events[1];

        let start = holiday.start.as_ref().unwrap();
        assert!(start.value.is_all_day());
        assert_eq!(start.raw, "20250210");

        assert_eq!(
            holiday.properties.get("categories"),
            Some(&ParsedValue::List(vec![
                ParsedValue::text("Vacation"),
                ParsedValue::text("Family"),
                ParsedValue::text("friends"),
            ]))
        );
    }

    #[test]
    fn escaped_backslash_is_not_a_newline() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:paths\r\n\
                   SUMMARY:C:\\\\new folder\r\n\
                   LOCATION:Desk\\; floor 2\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR\r\n";
        let events = parse_calendar(ics).unwrap();
        assert_eq!(events[0].summary.as_deref(), Some("C:\\new folder"));
        assert_eq!(events[0].location.as_deref(), Some("Desk; floor 2"));
    }

    #[test]
    fn blank_uid_and_summary_are_absent() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:\r\n\
                   SUMMARY:\r\n\
                   DTSTART:20250205T120000Z\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR\r\n";
        let events = parse_calendar(ics).unwrap();
        assert_eq!(events[0].uid, None);
        assert_eq!(events[0].summary, None);
    }

    #[test]
    fn keeps_tzid_and_floating_times() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:zoned\r\n\
                   DTSTART;TZID=Europe/Paris:20250205T100000\r\n\
                   DTEND:20250205T110000\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR\r\n";
        let events = parse_calendar(ics).unwrap();
        let event = &events[0];

        match &event.start.as_ref().unwrap().value {
            DateValue::Zoned { date_time, tzid } => {
                assert_eq!(tzid, "Europe/Paris");
                assert_eq!(date_time.format("%H:%M").to_string(), "10:00");
            }
            other => panic!("expected zoned date-time, got {:?}", other),
        }
        assert!(matches!(
            event.end.as_ref().unwrap().value,
            DateValue::Floating(_)
        ));
    }

    #[test]
    fn keeps_every_recurring_instance() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:series\r\n\
                   DTSTART:20250301T090000Z\r\n\
                   RRULE:FREQ=WEEKLY\r\n\
                   SUMMARY:Standup\r\n\
                   END:VEVENT\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:series\r\n\
                   RECURRENCE-ID:20250308T090000Z\r\n\
                   DTSTART:20250308T100000Z\r\n\
                   SUMMARY:Standup (moved)\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR\r\n";
        let events = parse_calendar(ics).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].uid, events[1].uid);
        assert_eq!(
            events[0].properties.get("rrule"),
            Some(&ParsedValue::text("FREQ=WEEKLY"))
        );
        assert!(matches!(
            events[1].properties.get("recurrence-id"),
            Some(ParsedValue::DateWithMeta(_))
        ));
    }

    #[test]
    fn repeated_properties_and_params() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:party\r\n\
                   DTSTART:20250301T090000Z\r\n\
                   ATTENDEE;CN=Alice:mailto:alice@example.com\r\n\
                   ATTENDEE;CN=Bob:mailto:bob@example.com\r\n\
                   EXDATE:20250308T090000Z,20250315T090000Z\r\n\
                   GEO:37.5;-122.25\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR\r\n";
        let events = parse_calendar(ics).unwrap();
        let props = &events[0].properties;

        let ParsedValue::List(attendees) = &props["attendee"] else {
            panic!("expected attendee list, got {:?}", props["attendee"]);
        };
        assert_eq!(attendees.len(), 2);
        let ParsedValue::Map(first) = &attendees[0] else {
            panic!("expected attendee with params");
        };
        assert_eq!(first["value"], ParsedValue::text("mailto:alice@example.com"));
        assert_eq!(
            first["params"],
            ParsedValue::Map(BTreeMap::from([(
                "cn".to_string(),
                ParsedValue::text("Alice")
            )]))
        );

        let ParsedValue::List(exdates) = &props["exdate"] else {
            panic!("expected exdate list");
        };
        assert_eq!(exdates.len(), 2);

        let ParsedValue::Map(geo) = &props["geo"] else {
            panic!("expected geo map");
        };
        assert_eq!(geo["latitude"], ParsedValue::Float(37.5));
    }

    #[test]
    fn unparseable_start_is_kept_as_text() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:broken\r\n\
                   DTSTART:not-a-date\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR\r\n";
        let events = parse_calendar(ics).unwrap();
        assert!(events[0].start.is_none());
        assert_eq!(
            events[0].properties.get("dtstart"),
            Some(&ParsedValue::text("not-a-date"))
        );
    }

    #[test]
    fn empty_calendar_has_no_events() {
        let events = parse_calendar("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n").unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn non_calendar_text_is_parse_error() {
        let err = parse_calendar("<html>Not Found</html>").unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Parse);
    }

    #[test]
    fn date_value_forms() {
        assert!(matches!(
            parse_date_value("20250210", None, false),
            Some(DateValue::Date(_))
        ));
        assert!(matches!(
            parse_date_value("20250210T080000", None, false),
            Some(DateValue::Floating(_))
        ));
        assert!(parse_date_value("2025-02-10", None, true).is_none());
    }
}
