pub mod rate;
pub mod series;
pub mod snapshot;

pub use rate::{Metric, RateCalculator, RateSample, RateState};
pub use series::{TimeSeriesBuffer, TimeSeriesPoint};
pub use snapshot::Snapshot;
