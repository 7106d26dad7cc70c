use crate::metrics::rate::{RateCalculator, RateSample};
use crate::metrics::series::{TimeSeriesBuffer, TimeSeriesPoint};
use crate::metrics::snapshot::Snapshot;
use crate::status::{self, DerivedStatus};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;

/// Everything the console shows, rebuilt from applied snapshots only.
#[derive(Debug, Clone)]
pub struct Dashboard {
    crawled: TimeSeriesBuffer,
    pending: TimeSeriesBuffer,
    crawled_rate: TimeSeriesBuffer,
    pending_rate: TimeSeriesBuffer,
    rates: RateCalculator,
    latest: Option<Snapshot>,
    status: Option<DerivedStatus>,
    last_rate: Option<RateSample>,
    applied_seq: u64,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeriesView {
    pub crawled: Vec<TimeSeriesPoint>,
    pub pending: Vec<TimeSeriesPoint>,
    pub crawled_rate: Vec<TimeSeriesPoint>,
    pub pending_rate: Vec<TimeSeriesPoint>,
}

/// Immutable copy of the dashboard handed to renderers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardView {
    pub seq: u64,
    pub updated_at: Option<DateTime<Utc>>,
    pub snapshot: Option<Snapshot>,
    pub status: Option<DerivedStatus>,
    pub rate: Option<RateSample>,
    pub series: SeriesView,
}

impl Dashboard {
    pub fn new(window: usize) -> Self {
        Self {
            crawled: TimeSeriesBuffer::new("Crawled", window),
            pending: TimeSeriesBuffer::new("Pending", window),
            crawled_rate: TimeSeriesBuffer::new("Crawled/min", window),
            pending_rate: TimeSeriesBuffer::new("Pending Δ/min", window),
            rates: RateCalculator::new(),
            latest: None,
            status: None,
            last_rate: None,
            applied_seq: 0,
            updated_at: None,
        }
    }

    /// Applies the snapshot fetched by cycle `seq` at `now`.
    ///
    /// Returns `None` without touching any state when a newer cycle has
    /// already been applied.
    pub fn apply(&mut self, seq: u64, snapshot: Snapshot, now: DateTime<Utc>) -> Option<DerivedStatus> {
        if seq <= self.applied_seq {
            log::debug!(
                "Discarding stale snapshot from cycle #{} (cycle #{} already applied)",
                seq,
                self.applied_seq
            );
            return None;
        }

        let label = now.with_timezone(&Local).format("%H:%M:%S").to_string();
        let status = status::derive(&snapshot);

        self.crawled.append(label.clone(), snapshot.crawled as f64);
        self.pending.append(label.clone(), snapshot.pending as f64);

        if let Some(rate) = self.rates.update(&snapshot, now) {
            self.crawled_rate.append(label.clone(), rate.crawled_per_minute as f64);
            self.pending_rate.append(label, rate.pending_change_per_minute as f64);
            self.last_rate = Some(rate);
        }

        self.latest = Some(snapshot);
        self.status = Some(status);
        self.applied_seq = seq;
        self.updated_at = Some(now);
        Some(status)
    }

    pub fn applied_seq(&self) -> u64 {
        self.applied_seq
    }

    pub fn status(&self) -> Option<DerivedStatus> {
        self.status
    }

    pub fn series(&self) -> [&TimeSeriesBuffer; 4] {
        [&self.crawled, &self.pending, &self.crawled_rate, &self.pending_rate]
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            seq: self.applied_seq,
            updated_at: self.updated_at,
            snapshot: self.latest,
            status: self.status,
            rate: self.last_rate,
            series: SeriesView {
                crawled: self.crawled.snapshot(),
                pending: self.pending.snapshot(),
                crawled_rate: self.crawled_rate.snapshot(),
                pending_rate: self.pending_rate.snapshot(),
            },
        }
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(crate::metrics::series::DEFAULT_WINDOW)
    }
}
