use super::ViewSink;
use crate::dashboard::DashboardView;
use crate::error::Result;
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// JSON Lines export: one applied view per line, flushed as it arrives so
/// the file can be tailed while the monitor runs.
pub struct JsonOutput {
    out: BufWriter<File>,
    last_seq: u64,
}

impl JsonOutput {
    pub fn new(path: PathBuf) -> Result<Self> {
        let out = BufWriter::new(File::create(path)?);
        Ok(Self { out, last_seq: 0 })
    }
}

#[async_trait]
impl ViewSink for JsonOutput {
    async fn write(&mut self, view: &DashboardView) -> Result<()> {
        if view.snapshot.is_none() || view.seq <= self.last_seq {
            return Ok(());
        }

        serde_json::to_writer(&mut self.out, view)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.last_seq = view.seq;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
