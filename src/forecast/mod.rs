pub mod additive;
pub mod builder;
pub mod metrics;
pub mod seasonality;

pub use additive::*;
pub use builder::*;
pub use metrics::*;

use serde::Serialize;

use crate::domain::{ForecastPoint, TimeSeries};
use crate::error::Result;

/// Output of one forecasting run
#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub state: String,
    /// Strictly-future days, ordered by date
    pub points: Vec<ForecastPoint>,
    /// In-sample accuracy of the fitted model
    pub fit_metrics: Option<ForecastMetrics>,
}

/// Fits a model on a historical daily series and predicts future days.
///
/// Implementations build a fresh model on every call and keep no state
/// between calls.
pub trait Forecaster: Send + Sync {
    fn forecast(&self, series: &TimeSeries, horizon_days: usize) -> Result<Forecast>;
}
