//! Canonical date rendering and clocks.
//!
//! Indexed events are filtered and sorted downstream with plain string
//! comparison, so every date value collapses to one fixed-width textual form:
//!
//! - all-day dates: `YYYY-MM-DD`
//! - date-times: `YYYY-MM-DDTHH:MM:SS`, in local wall-clock time
//!
//! Both forms sort lexicographically in chronological order.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// strftime pattern for all-day dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// strftime pattern for date-times.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Renders an all-day date.
pub fn render_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Renders a wall-clock date-time as written, without any conversion.
pub fn render_floating(date_time: NaiveDateTime) -> String {
    date_time.format(DATETIME_FORMAT).to_string()
}

/// Renders an absolute instant as wall-clock time in `tz`.
pub fn render_instant<From, To>(instant: &DateTime<From>, tz: &To) -> String
where
    From: TimeZone,
    To: TimeZone,
{
    render_floating(instant.with_timezone(tz).naive_local())
}

/// A source of "now" in epoch milliseconds.
///
/// Cache timestamps are stored as epoch milliseconds, so the gate and the
/// orchestrator read time through this trait rather than calling
/// [`Utc::now`] directly.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at `millis`.
    pub fn new(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(duration_millis(by), Ordering::SeqCst);
    }

    /// Jumps the clock to an absolute time.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Converts a duration to whole milliseconds, saturating at `i64::MAX`.
pub fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Returns the elapsed time between two epoch-millisecond timestamps.
///
/// A `later` that precedes `earlier` (clock skew) yields zero.
pub fn elapsed_between(earlier: i64, later: i64) -> Duration {
    Duration::from_millis(later.saturating_sub(earlier).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn renders_date_fixed_width() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 5).unwrap();
        assert_eq!(render_date(date), "2025-02-05");
    }

    #[test]
    fn renders_floating_as_written() {
        let dt = NaiveDate::from_ymd_opt(2025, 2, 5)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        assert_eq!(render_floating(dt), "2025-02-05T09:05:03");
    }

    #[test]
    fn renders_instant_in_target_zone() {
        let instant = Utc.with_ymd_and_hms(2025, 2, 5, 23, 30, 0).unwrap();
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(render_instant(&instant, &tz), "2025-02-06T01:30:00");
        assert_eq!(render_instant(&instant, &Utc), "2025-02-05T23:30:00");
    }

    #[test]
    fn rendered_strings_sort_chronologically() {
        let mut rendered = vec![
            render_floating(NaiveDate::from_ymd_opt(2025, 11, 2).unwrap().and_hms_opt(8, 0, 0).unwrap()),
            render_date(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()),
            render_floating(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap().and_hms_opt(23, 59, 59).unwrap()),
            render_floating(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap().and_hms_opt(10, 0, 0).unwrap()),
        ];
        rendered.sort();
        assert_eq!(
            rendered,
            vec![
                "2024-12-31T23:59:59",
                "2025-03-09",
                "2025-03-09T10:00:00",
                "2025-11-02T08:00:00",
            ]
        );
    }

    #[test]
    fn manual_clock_moves_on_demand() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.now_millis(), 11_000);
        clock.set(5);
        assert_eq!(clock.now_millis(), 5);
    }

    #[test]
    fn elapsed_never_negative() {
        assert_eq!(elapsed_between(10_000, 4_000), Duration::ZERO);
        assert_eq!(elapsed_between(4_000, 10_000), Duration::from_secs(6));
    }
}
