//! Unsupervised anomaly detection over a state's reporting window

pub mod isolation_forest;

pub use isolation_forest::*;

use crate::domain::{AnomalyLabel, TimeSeries};
use crate::error::Result;

/// Labels every observation of a series as normal or anomalous.
///
/// One label per input point, same order and dates. A detector trains a new
/// model on each call and never reuses it.
pub trait AnomalyDetector: Send + Sync {
    fn detect(&self, series: &TimeSeries) -> Result<Vec<AnomalyLabel>>;
}

/// Count of flagged labels
pub fn anomaly_count(labels: &[AnomalyLabel]) -> usize {
    labels.iter().filter(|l| l.is_anomaly).count()
}
