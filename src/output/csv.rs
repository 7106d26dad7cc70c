use super::ViewSink;
use crate::dashboard::DashboardView;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct Row<'a> {
    seq: u64,
    label: &'a str,
    pending: u64,
    crawled: u64,
    failed: u64,
    media: u64,
    status: String,
    paused: bool,
    crawled_per_minute: Option<i64>,
    pending_change_per_minute: Option<i64>,
}

/// One row per applied cycle.
pub struct CsvOutput {
    writer: ::csv::Writer<std::fs::File>,
    last_seq: u64,
}

impl CsvOutput {
    pub fn new(path: PathBuf) -> Result<Self> {
        let writer = ::csv::Writer::from_path(path)?;
        Ok(Self { writer, last_seq: 0 })
    }
}

#[async_trait]
impl ViewSink for CsvOutput {
    async fn write(&mut self, view: &DashboardView) -> Result<()> {
        let (Some(snapshot), Some(status)) = (view.snapshot, view.status) else {
            return Ok(());
        };
        if view.seq <= self.last_seq {
            return Ok(());
        }

        let label = view
            .series
            .crawled
            .last()
            .map(|p| p.label.as_str())
            .unwrap_or_default();

        self.writer.serialize(Row {
            seq: view.seq,
            label,
            pending: snapshot.pending,
            crawled: snapshot.crawled,
            failed: snapshot.failed,
            media: snapshot.media,
            status: status.label.to_string(),
            paused: snapshot.is_paused,
            crawled_per_minute: view.rate.map(|r| r.crawled_per_minute),
            pending_change_per_minute: view.rate.map(|r| r.pending_change_per_minute),
        })?;
        self.writer.flush()?;
        self.last_seq = view.seq;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
