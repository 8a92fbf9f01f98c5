//! Wall-clock access and the on-disk timestamp format.
//!
//! All timestamps are local civil time with second precision and no timezone
//! marker, e.g. `2024-03-09 17:04:55`.

use core::cell::Cell;

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};

/// `strftime` pattern used for every timestamp written to the logs.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of local wall-clock time.
pub trait Clock {
    /// Current local time, truncated to whole seconds.
    fn now(&self) -> NaiveDateTime;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// The host's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// A clock that only moves when told to.
///
/// Used to drive hour/day rollover deterministically.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Cell<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.now.set(now);
    }

    pub fn advance(&self, by: TimeDelta) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

/// Format a timestamp the way it appears at the start of every log record.
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse the timestamp at the start of a log line.
///
/// Anything after the seconds field is ignored. Returns `None` when the line
/// does not begin with a valid `YYYY-MM-DD HH:MM:SS` date.
pub fn parse_leading_timestamp(line: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_and_remainder(line, TIMESTAMP_FORMAT)
        .ok()
        .map(|(timestamp, _rest)| timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, s))
            .expect("valid test timestamp")
    }

    #[test]
    fn test_format_is_zero_padded() {
        assert_eq!(format_timestamp(&at(2024, 3, 9, 7, 4, 5)), "2024-03-09 07:04:05");
    }

    #[test]
    fn test_parse_ignores_record_tail() {
        let parsed = parse_leading_timestamp("2024-03-09 07:04:05 | 21.50\n");
        assert_eq!(parsed, Some(at(2024, 3, 9, 7, 4, 5)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_leading_timestamp("not-a-timestamp | 5.00"), None);
        assert_eq!(parse_leading_timestamp(""), None);
        assert_eq!(parse_leading_timestamp("2024-13-01 00:00:00 | 1.00"), None);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(at(2024, 1, 1, 23, 59, 59));
        clock.advance(TimeDelta::seconds(1));
        assert_eq!(clock.now(), at(2024, 1, 2, 0, 0, 0));
        assert_eq!((&clock).now(), at(2024, 1, 2, 0, 0, 0));
    }
}
