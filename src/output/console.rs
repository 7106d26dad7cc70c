use super::ViewSink;
use crate::dashboard::DashboardView;
use crate::error::{Error, Result};
use crate::metrics::series::TimeSeriesPoint;
use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;

const SPARKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Live status lines. Falls back to plain `println!` without a progress display.
pub struct ConsoleOutput {
    lines: Option<ConsoleLines>,
}

struct ConsoleLines {
    status: ProgressBar,
    series: [ProgressBar; 4],
}

impl ConsoleOutput {
    pub fn new(multi: Option<Arc<MultiProgress>>) -> Result<Self> {
        let lines = match multi {
            Some(multi) => {
                let style = ProgressStyle::with_template("{prefix:>14.bold} {msg}")
                    .map_err(|e| Error::Internal(e.to_string()))?;
                let line = |prefix: &'static str| {
                    let bar = multi.add(ProgressBar::new_spinner());
                    bar.set_style(style.clone());
                    bar.set_prefix(prefix);
                    bar
                };
                Some(ConsoleLines {
                    status: line("Status"),
                    series: [
                        line("Crawled"),
                        line("Pending"),
                        line("Crawled/min"),
                        line("Pending Δ/min"),
                    ],
                })
            }
            None => None,
        };
        Ok(Self { lines })
    }
}

#[async_trait]
impl ViewSink for ConsoleOutput {
    async fn write(&mut self, view: &DashboardView) -> Result<()> {
        let Some(status) = status_line(view) else {
            return Ok(());
        };

        match &self.lines {
            Some(lines) => {
                lines.status.set_message(status);
                let series = [
                    &view.series.crawled,
                    &view.series.pending,
                    &view.series.crawled_rate,
                    &view.series.pending_rate,
                ];
                for (bar, points) in lines.series.iter().zip(series) {
                    bar.set_message(series_line(points));
                }
            }
            None => println!("{}", status),
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(lines) = &self.lines {
            lines.status.finish();
            for bar in &lines.series {
                bar.finish();
            }
        }
        Ok(())
    }
}

/// One-line summary of the latest applied snapshot.
pub fn status_line(view: &DashboardView) -> Option<String> {
    let snapshot = view.snapshot?;
    let status = view.status?;

    let rate = match view.rate {
        Some(rate) => format!(
            "{:+}/min crawled, {:+}/min pending",
            rate.crawled_per_minute, rate.pending_change_per_minute
        ),
        None => "rates pending".to_string(),
    };

    let enabled = |flag: bool| if flag { "on" } else { "off" };
    Some(format!(
        "{} ({}) | pending {} | crawled {} | failed {} | media {} | {} | pause:{} resume:{}",
        status.label,
        status.pause_label,
        snapshot.pending,
        snapshot.crawled,
        snapshot.failed,
        snapshot.media,
        rate,
        enabled(status.buttons.pause_enabled),
        enabled(status.buttons.resume_enabled),
    ))
}

fn series_line(points: &[TimeSeriesPoint]) -> String {
    match points.last() {
        Some(last) => format!(
            "{} {} @ {}",
            sparkline(points.iter().map(|p| p.value)),
            last.value,
            last.label
        ),
        None => "-".to_string(),
    }
}

/// Scales values between their own min and max onto block characters.
pub fn sparkline(values: impl Iterator<Item = f64> + Clone) -> String {
    let (min, max) = values
        .clone()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = max - min;
    let top = (SPARKS.len() - 1) as f64;

    values
        .map(|v| {
            let idx = if span > 0.0 { ((v - min) / span * top).round() } else { 0.0 };
            SPARKS[idx as usize]
        })
        .collect()
}
