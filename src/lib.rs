pub mod config;
pub mod control;
pub mod dashboard;
pub mod error;
pub mod metrics;
pub mod output;
pub mod poller;
pub mod retry;
pub mod source;
pub mod status;

pub use control::{Action, ActionTable, CommandContext, ControlGateway, ControlPanel};
pub use dashboard::{Dashboard, DashboardView};
pub use error::{Error, Result};
pub use metrics::{RateCalculator, RateSample, RateState, Snapshot, TimeSeriesBuffer};
pub use poller::{CycleOutcome, Poller, PollerSettings, RefreshHandle, Trigger, refresh_channel};
pub use retry::RetryPolicy;
pub use source::{HttpSnapshotSource, SnapshotSource};
pub use status::{ButtonState, DerivedStatus, StatusLabel, derive};
