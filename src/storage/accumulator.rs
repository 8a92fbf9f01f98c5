use chrono::NaiveDateTime;
use log::debug;

use super::{Granularity, LogKind, Reading};

/// Events produced by the accumulator for the storage manager
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RollupEvent {
    /// A new raw reading was received
    RawReading(Reading),
    /// An hour ended; carries the hour's average stamped with the closing reading's time
    HourlyAverage(Reading),
    /// A day ended; carries the day's average stamped with the closing reading's time
    DailyAverage(Reading),
}

impl RollupEvent {
    pub const fn log_kind(&self) -> LogKind {
        match self {
            Self::RawReading(_) => LogKind::Raw,
            Self::HourlyAverage(_) => LogKind::Hourly,
            Self::DailyAverage(_) => LogKind::Daily,
        }
    }

    pub const fn reading(&self) -> &Reading {
        match self {
            Self::RawReading(r) | Self::HourlyAverage(r) | Self::DailyAverage(r) => r,
        }
    }
}

/// Running sum and count for the current hour or day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationWindow {
    sum: f64,
    count: u32,
    /// Unit id observed at the last update
    unit_id: u32,
}

impl AggregationWindow {
    pub const fn new(unit_id: u32) -> Self {
        Self {
            sum: 0.0,
            count: 0,
            unit_id,
        }
    }

    pub const fn sum(&self) -> f64 {
        self.sum
    }

    pub const fn count(&self) -> u32 {
        self.count
    }

    pub const fn unit_id(&self) -> u32 {
        self.unit_id
    }

    /// Adds `value`, then checks `current_unit_id` against the stored unit.
    ///
    /// On a unit change the average of everything accumulated, including
    /// `value`, is returned and the window restarts empty in the new unit.
    pub fn observe(&mut self, value: f32, current_unit_id: u32) -> Option<f32> {
        self.sum += f64::from(value);
        self.count += 1;

        if current_unit_id == self.unit_id {
            return None;
        }

        // count >= 1 here
        let average = (self.sum / f64::from(self.count)) as f32;
        *self = Self::new(current_unit_id);
        Some(average)
    }
}

/// Statistics over every reading since the process started
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifetimeStats {
    pub total_readings: u64,
    pub sum: f64,
    pub min: f32,
    pub max: f32,
}

impl Default for LifetimeStats {
    fn default() -> Self {
        Self {
            total_readings: 0,
            sum: 0.0,
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        }
    }
}

impl LifetimeStats {
    pub fn update(&mut self, value: f32) {
        self.total_readings += 1;
        self.sum += f64::from(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> Option<f64> {
        (self.total_readings > 0).then(|| self.sum / self.total_readings as f64)
    }
}

/// In-memory accumulator turning raw readings into hourly and daily averages.
///
/// Both windows start in the unit that is current when the accumulator is
/// created, so a restart never flushes a bogus average; whatever had been
/// accumulated before the restart is simply gone.
///
/// The unit id is taken from the `now` passed to [`add_reading`], not from the
/// reading's own timestamp. A reading stamped 23:59:59 that is processed after
/// midnight closes the day it was stamped in.
///
/// [`add_reading`]: RollupAccumulator::add_reading
#[derive(Debug, Clone)]
pub struct RollupAccumulator {
    hour: AggregationWindow,
    day: AggregationWindow,
    lifetime: LifetimeStats,
}

impl RollupAccumulator {
    pub fn new(now: &NaiveDateTime) -> Self {
        Self {
            hour: AggregationWindow::new(Granularity::Hour.unit_id(now)),
            day: AggregationWindow::new(Granularity::Day.unit_id(now)),
            lifetime: LifetimeStats::default(),
        }
    }

    pub fn window(&self, granularity: Granularity) -> &AggregationWindow {
        match granularity {
            Granularity::Hour => &self.hour,
            Granularity::Day => &self.day,
        }
    }

    pub fn lifetime_stats(&self) -> &LifetimeStats {
        &self.lifetime
    }

    /// Record a reading and return the events it caused, raw first, then
    /// hourly, then daily.
    pub fn add_reading(&mut self, reading: Reading, now: &NaiveDateTime) -> Vec<RollupEvent> {
        let mut events = Vec::with_capacity(3);
        events.push(RollupEvent::RawReading(reading));

        self.lifetime.update(reading.value);
        debug!("Recalculated lifetime stats: {:?}", self.lifetime);

        if let Some(avg) = self
            .hour
            .observe(reading.value, Granularity::Hour.unit_id(now))
        {
            events.push(RollupEvent::HourlyAverage(Reading::new(reading.timestamp, avg)));
        }

        if let Some(avg) = self
            .day
            .observe(reading.value, Granularity::Day.unit_id(now))
        {
            events.push(RollupEvent::DailyAverage(Reading::new(reading.timestamp, avg)));
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, d)
            .and_then(|date| date.and_hms_opt(h, m, s))
            .unwrap()
    }

    #[test]
    fn test_window_accumulates_within_unit() {
        let mut window = AggregationWindow::new(5);
        for v in [1.5, 2.5, 3.0, -1.0] {
            assert_eq!(window.observe(v, 5), None);
        }
        assert_eq!(window.sum(), 6.0);
        assert_eq!(window.count(), 4);
        assert_eq!(window.unit_id(), 5);
    }

    #[test]
    fn test_rollover_includes_triggering_value() {
        let mut window = AggregationWindow::new(10);
        window.observe(23.5, 10);
        window.observe(24.0, 10);

        let avg = window.observe(25.0, 11).expect("unit changed");
        assert!((avg - 24.166_666).abs() < 1e-4);
        assert_eq!(window, AggregationWindow::new(11));
    }

    #[test]
    fn test_rollover_on_first_observation() {
        let mut window = AggregationWindow::new(3);
        assert_eq!(window.observe(7.0, 4), Some(7.0));
        assert_eq!(window.count(), 0);
        assert_eq!(window.unit_id(), 4);
    }

    #[test]
    fn test_no_rollover_at_startup() {
        let now = at(1, 12, 0, 0);
        let mut acc = RollupAccumulator::new(&now);
        let events = acc.add_reading(Reading::new(now, 20.0), &now);
        assert_eq!(events, vec![RollupEvent::RawReading(Reading::new(now, 20.0))]);
    }

    #[test]
    fn test_hour_and_day_rollover_order() {
        let start = at(1, 23, 30, 0);
        let mut acc = RollupAccumulator::new(&start);
        acc.add_reading(Reading::new(start, 10.0), &start);

        let next = at(2, 0, 0, 5);
        let events = acc.add_reading(Reading::new(next, 20.0), &next);
        assert_eq!(
            events,
            vec![
                RollupEvent::RawReading(Reading::new(next, 20.0)),
                RollupEvent::HourlyAverage(Reading::new(next, 15.0)),
                RollupEvent::DailyAverage(Reading::new(next, 15.0)),
            ]
        );
        assert_eq!(acc.window(Granularity::Hour).count(), 0);
        assert_eq!(acc.window(Granularity::Day).unit_id(), Granularity::Day.unit_id(&next));
    }

    #[test]
    fn test_unit_sampled_at_processing_time() {
        // Stamped before midnight, processed after: the stale timestamp does
        // not protect the day window from rolling over.
        let start = at(1, 23, 59, 0);
        let mut acc = RollupAccumulator::new(&start);
        let stamped = at(1, 23, 59, 59);
        let processed = at(2, 0, 0, 1);

        let events = acc.add_reading(Reading::new(stamped, 4.0), &processed);
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], RollupEvent::DailyAverage(Reading::new(stamped, 4.0)));
    }

    #[test]
    fn test_lifetime_stats() {
        let now = at(1, 8, 0, 0);
        let mut acc = RollupAccumulator::new(&now);
        for v in [3.0, -2.0, 5.0] {
            acc.add_reading(Reading::new(now, v), &now);
        }
        let stats = acc.lifetime_stats();
        assert_eq!(stats.total_readings, 3);
        assert_eq!(stats.min, -2.0);
        assert_eq!(stats.max, 5.0);
        assert_eq!(stats.mean(), Some(2.0));
        assert_eq!(LifetimeStats::default().mean(), None);
    }
}
