//! The polling loop tying the byte source to storage.
//!
//! One iteration reads at most one byte. When that byte completes a record,
//! the reading is written to the raw log, folded into the hourly and daily
//! windows, and the retention cadence is checked. When no byte is available
//! the loop sleeps for the poll interval before trying again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::clock::Clock;
use crate::config::LoggerConfig;
use crate::sensors::{ByteSource, LineAssembler};
use crate::storage::{Reading, RollupAccumulator, StorageManager};

/// Result of a single poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Poll {
    /// The source had nothing to read
    Idle,
    /// A byte was consumed without completing a record
    Byte,
    /// A record was completed and fully processed
    Reading(Reading),
}

pub struct SamplingLoop<S, C> {
    source: S,
    clock: C,
    assembler: LineAssembler,
    accumulator: RollupAccumulator,
    storage: StorageManager,
    poll_interval: Duration,
}

impl<S: ByteSource, C: Clock> SamplingLoop<S, C> {
    /// Windows start in the hour and day current at construction.
    pub fn new(source: S, clock: C, config: &LoggerConfig) -> Self {
        let accumulator = RollupAccumulator::new(&clock.now());
        Self {
            source,
            clock,
            assembler: LineAssembler::new(),
            accumulator,
            storage: StorageManager::new(config),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn accumulator(&self) -> &RollupAccumulator {
        &self.accumulator
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Read at most one byte and process it. Never sleeps.
    pub fn poll_once(&mut self) -> Poll {
        let mut chunk = [0u8; 1];
        if self.source.read(&mut chunk) == 0 {
            return Poll::Idle;
        }

        match self.assembler.feed(chunk[0], &self.clock) {
            Some(reading) => {
                self.process_reading(reading);
                Poll::Reading(reading)
            }
            None => Poll::Byte,
        }
    }

    /// Store a completed reading, update both windows, then prune if due.
    ///
    /// The hour and day are sampled from the clock here, after the reading
    /// was stamped, so a slow pass near a boundary may attribute the reading
    /// to the next unit.
    pub fn process_reading(&mut self, reading: Reading) {
        let now = self.clock.now();
        for event in self.accumulator.add_reading(reading, &now) {
            self.storage.process_event(&event);
        }
        self.storage.prune_if_due(&now);
    }

    /// Poll forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    /// Poll until `stop` is set. The flag is checked before every iteration.
    pub fn run_until(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            self.step();
        }
    }

    fn step(&mut self) {
        if self.poll_once() == Poll::Idle {
            std::thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::LogKind;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::collections::VecDeque;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 10)
            .and_then(|d| d.and_hms_opt(14, 20, 0))
            .unwrap()
    }

    fn config(dir: &std::path::Path) -> LoggerConfig {
        LoggerConfig {
            log_dir: dir.to_path_buf(),
            poll_interval_ms: 0,
            ..LoggerConfig::default()
        }
    }

    #[test]
    fn test_poll_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(start());
        let source: VecDeque<u8> = b"4\n".iter().copied().collect();
        let mut sampler = SamplingLoop::new(source, &clock, &config(dir.path()));

        assert_eq!(sampler.poll_once(), Poll::Byte);
        assert_eq!(sampler.poll_once(), Poll::Reading(Reading::new(start(), 4.0)));
        assert_eq!(sampler.poll_once(), Poll::Idle);
    }

    #[test]
    fn test_first_reading_triggers_prune() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(start());
        let source: VecDeque<u8> = b"1\n".iter().copied().collect();
        let mut sampler = SamplingLoop::new(source, &clock, &config(dir.path()));

        assert_eq!(sampler.storage().last_prune(), None);
        while sampler.poll_once() != Poll::Idle {}
        assert_eq!(sampler.storage().last_prune(), Some(start()));
    }

    #[test]
    fn test_run_until_respects_stop_flag() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(start());
        let stop = AtomicBool::new(true);
        let source: VecDeque<u8> = b"1\n".iter().copied().collect();
        let mut sampler = SamplingLoop::new(source, &clock, &config(dir.path()));

        // Already stopped: nothing is read
        sampler.run_until(&stop);
        assert!(!sampler.storage().storage().path(LogKind::Raw).exists());
    }
}
