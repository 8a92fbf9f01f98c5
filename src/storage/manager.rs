use chrono::{NaiveDateTime, TimeDelta};
use log::{info, warn};

use super::{LogStorage, PruneReport, RollupEvent, prune_log};
use crate::config::{LoggerConfig, RetentionConfig};

/// Storage manager that writes accumulator events to the logs and keeps them
/// trimmed.
///
/// Write and prune failures are logged and swallowed: a reading that cannot
/// be stored is lost, but the logger keeps running.
#[derive(Debug)]
pub struct StorageManager {
    storage: LogStorage,
    retention: RetentionConfig,
    prune_interval: TimeDelta,
    /// `None` until the first pass, so the first reading always triggers one
    last_prune: Option<NaiveDateTime>,
}

impl StorageManager {
    pub fn new(config: &LoggerConfig) -> Self {
        let interval_secs = i64::try_from(config.prune_interval_secs).unwrap_or(i64::MAX);
        Self {
            storage: LogStorage::new(&config.log_dir),
            retention: config.retention,
            prune_interval: TimeDelta::try_seconds(interval_secs).unwrap_or(TimeDelta::MAX),
            last_prune: None,
        }
    }

    pub fn storage(&self) -> &LogStorage {
        &self.storage
    }

    pub fn last_prune(&self) -> Option<NaiveDateTime> {
        self.last_prune
    }

    /// Write an event to its log
    pub fn process_event(&mut self, event: &RollupEvent) {
        let reading = event.reading();
        match event {
            RollupEvent::RawReading(_) => info!("{reading}"),
            RollupEvent::HourlyAverage(_) => {
                info!("hour ended, avg: {:.2} saved.", reading.value)
            }
            RollupEvent::DailyAverage(_) => {
                info!("day ended, avg: {:.2} saved.", reading.value)
            }
        }

        let kind = event.log_kind();
        if let Err(e) = self.storage.append_reading(kind, reading) {
            warn!("Dropped {} record: {e}", kind.label());
        }
    }

    /// Whether more than the prune interval has passed since the last pass.
    pub fn prune_due(&self, now: &NaiveDateTime) -> bool {
        match self.last_prune {
            None => true,
            Some(last) => *now - last > self.prune_interval,
        }
    }

    /// Prune all logs if the interval has elapsed. Returns whether a pass ran.
    pub fn prune_if_due(&mut self, now: &NaiveDateTime) -> bool {
        if !self.prune_due(now) {
            return false;
        }
        self.prune_all(now);
        true
    }

    /// Prune raw, hourly and daily logs one after the other.
    ///
    /// The passes are independent: a failure on one log is reported and the
    /// remaining logs are still pruned.
    pub fn prune_all(&mut self, now: &NaiveDateTime) -> [Option<PruneReport>; 3] {
        info!("cleanup logs");

        let reports = self.retention.policies().map(|policy| {
            let path = self.storage.path(policy.kind);
            match prune_log(&path, &policy, now) {
                Ok(report) => {
                    info!("removed records older than {} sec", policy.max_age_secs);
                    if report.malformed > 0 {
                        warn!(
                            "{}: dropped {} lines without a timestamp",
                            path.display(),
                            report.malformed
                        );
                    }
                    Some(report)
                }
                Err(e) => {
                    warn!("Failed to prune {} log: {e}", policy.kind.label());
                    None
                }
            }
        });

        self.last_prune = Some(*now);
        reports
    }
}
