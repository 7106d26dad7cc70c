use crate::metrics::snapshot::Snapshot;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Counter a [`RateState`] tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Crawled,
    Pending,
}

impl Metric {
    pub fn value(self, snapshot: &Snapshot) -> u64 {
        match self {
            Metric::Crawled => snapshot.crawled,
            Metric::Pending => snapshot.pending,
        }
    }
}

/// Last observation of one metric. Empty until the first snapshot arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateState {
    pub last_snapshot: Option<Snapshot>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl RateState {
    /// Advances the state with `current`, returning the next state and the
    /// per-minute change since the previous observation, if there was one.
    pub fn step(self, metric: Metric, current: &Snapshot, now: DateTime<Utc>) -> (Self, Option<i64>) {
        let rate = match (self.last_snapshot, self.last_timestamp) {
            (Some(last), Some(at)) => Some(per_minute(
                metric.value(&last),
                metric.value(current),
                now - at,
            )),
            _ => None,
        };

        let next = RateState {
            last_snapshot: Some(*current),
            last_timestamp: Some(now),
        };
        (next, rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateSample {
    pub crawled_per_minute: i64,
    pub pending_change_per_minute: i64,
}

/// Pages-per-minute rates normalized by the real time between two
/// snapshots, so a late or missed poll does not inflate the numbers.
#[derive(Debug, Clone, Default)]
pub struct RateCalculator {
    crawled: RateState,
    pending: RateState,
}

impl RateCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, current: &Snapshot, now: DateTime<Utc>) -> Option<RateSample> {
        let (crawled, crawled_rate) = self.crawled.step(Metric::Crawled, current, now);
        let (pending, pending_rate) = self.pending.step(Metric::Pending, current, now);
        self.crawled = crawled;
        self.pending = pending;

        let (crawled_per_minute, pending_change_per_minute) = crawled_rate.zip(pending_rate)?;
        Some(RateSample {
            crawled_per_minute,
            pending_change_per_minute,
        })
    }

    pub fn state(&self, metric: Metric) -> &RateState {
        match metric {
            Metric::Crawled => &self.crawled,
            Metric::Pending => &self.pending,
        }
    }
}

fn per_minute(previous: u64, current: u64, elapsed: TimeDelta) -> i64 {
    let delta_minutes = elapsed.num_milliseconds() as f64 / MILLIS_PER_MINUTE;
    if delta_minutes > 0.0 {
        let change = current as f64 - previous as f64;
        round_half_up(change / delta_minutes)
    } else {
        // Zero or backwards clock.
        0
    }
}

fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}
