use crate::dashboard::DashboardView;
use crate::error::Result;
use async_trait::async_trait;

pub mod console;
pub mod csv;
pub mod json;

/// Receives every dashboard view the poller publishes.
#[async_trait]
pub trait ViewSink: Send + Sync {
    async fn write(&mut self, view: &DashboardView) -> Result<()>;
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
