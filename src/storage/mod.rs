pub mod accumulator;
pub mod log_writer;
pub mod manager;
pub mod retention;

use core::fmt::Display;
use std::path::PathBuf;

use chrono::{Datelike, NaiveDateTime, Timelike};
use thiserror::Error;

use crate::clock::format_timestamp;

pub use accumulator::{AggregationWindow, LifetimeStats, RollupAccumulator, RollupEvent};
pub use log_writer::LogStorage;
pub use manager::StorageManager;
pub use retention::{PruneReport, RetentionPolicy, prune_log};

pub const SECS_PER_DAY: u64 = 24 * 3600;
pub const SECS_PER_MONTH: u64 = 30 * SECS_PER_DAY;
pub const SECS_PER_YEAR: u64 = 365 * SECS_PER_DAY;

/// Errors raised by the log files.
///
/// None of these are fatal to the logger; the storage manager reports them
/// and carries on with the next reading.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A log or its temporary rewrite could not be opened, written or renamed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File the operation was acting on
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// One numeric value received from the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Local wall-clock time the record's delimiter was received
    pub timestamp: NaiveDateTime,
    pub value: f32,
}

impl Reading {
    pub const fn new(timestamp: NaiveDateTime, value: f32) -> Self {
        Self { timestamp, value }
    }

    pub fn timestamp_string(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

impl Display for Reading {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} raw: {:.1}", self.timestamp_string(), self.value)
    }
}

/// The three plain-text logs kept on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Every individual reading
    Raw,
    /// One average per completed hour
    Hourly,
    /// One average per completed day
    Daily,
}

impl LogKind {
    /// All logs, in the order they are pruned.
    pub const ALL: [LogKind; 3] = [LogKind::Raw, LogKind::Hourly, LogKind::Daily];

    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Raw => "log_raw.txt",
            Self::Hourly => "log_hour.txt",
            Self::Daily => "log_day.txt",
        }
    }

    /// Default maximum record age in seconds
    pub const fn default_max_age_secs(self) -> u64 {
        match self {
            Self::Raw => SECS_PER_DAY,
            Self::Hourly => SECS_PER_MONTH,
            Self::Daily => SECS_PER_YEAR,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Hourly => "hour",
            Self::Daily => "day",
        }
    }
}

/// Calendar unit an aggregation window spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hour,
    Day,
}

impl Granularity {
    /// Identifier of the unit containing `at`: hour-of-day (0-23) or
    /// zero-based day-of-year (0-365).
    pub fn unit_id(self, at: &NaiveDateTime) -> u32 {
        match self {
            Self::Hour => at.hour(),
            Self::Day => at.ordinal0(),
        }
    }

    /// Log receiving this granularity's averages
    pub const fn log_kind(self) -> LogKind {
        match self {
            Self::Hour => LogKind::Hourly,
            Self::Day => LogKind::Daily,
        }
    }

    pub const fn label(self) -> &'static str {
        self.log_kind().label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_retention_thresholds() {
        assert_eq!(LogKind::Raw.default_max_age_secs(), 86_400);
        assert_eq!(LogKind::Hourly.default_max_age_secs(), 2_592_000);
        assert_eq!(LogKind::Daily.default_max_age_secs(), 31_536_000);
    }

    #[test]
    fn test_unit_ids() {
        let at = NaiveDate::from_ymd_opt(2024, 12, 31)
            .and_then(|d| d.and_hms_opt(23, 10, 0))
            .unwrap();
        assert_eq!(Granularity::Hour.unit_id(&at), 23);
        // 2024 is a leap year
        assert_eq!(Granularity::Day.unit_id(&at), 365);
    }

    #[test]
    fn test_reading_display() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .unwrap();
        let reading = Reading::new(at, 23.46);
        assert_eq!(reading.to_string(), "2024-01-02 03:04:05 raw: 23.5");
    }
}
