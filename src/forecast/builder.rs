use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::{ConsumptionRecord, ConsumptionTable, ReportingWindow, SeriesPoint, TimeSeries};
use crate::error::{AnalysisError, Result};

/// How readings sharing a date within one state are resolved
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail the extraction
    Reject,
    /// Add the readings together
    #[default]
    Sum,
    /// Average the readings
    Mean,
}

/// Extracts per-state daily series from the consumption table
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSeriesBuilder {
    pub duplicate_policy: DuplicatePolicy,
}

impl TimeSeriesBuilder {
    pub fn new(duplicate_policy: DuplicatePolicy) -> Self {
        Self { duplicate_policy }
    }

    /// Full history of a state
    pub fn build(&self, table: &ConsumptionTable, state: &str) -> Result<TimeSeries> {
        if !table.contains_state(state) {
            return Err(AnalysisError::UnknownState(state.to_string()));
        }
        self.collect(state, table.state_records(state))
    }

    /// History of a state restricted to one reporting window.
    ///
    /// May be empty when the state has no readings in that month.
    pub fn build_window(
        &self,
        table: &ConsumptionTable,
        state: &str,
        window: ReportingWindow,
    ) -> Result<TimeSeries> {
        if !table.contains_state(state) {
            return Err(AnalysisError::UnknownState(state.to_string()));
        }
        self.collect(
            state,
            table.state_records(state).filter(|r| window.contains(r.date)),
        )
    }

    fn collect<'a>(
        &self,
        state: &str,
        records: impl Iterator<Item = &'a ConsumptionRecord>,
    ) -> Result<TimeSeries> {
        let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        for r in records {
            by_date.entry(r.date).or_default().push(r.consumption_kwh);
        }

        let mut points = Vec::with_capacity(by_date.len());
        for (date, values) in by_date {
            let value = match (values.len(), self.duplicate_policy) {
                (1, _) => values[0],
                (_, DuplicatePolicy::Reject) => {
                    return Err(AnalysisError::model_fit(format!(
                        "{} readings for {} on {}",
                        values.len(),
                        state,
                        date
                    )));
                }
                (_, DuplicatePolicy::Sum) => values.iter().sum(),
                (n, DuplicatePolicy::Mean) => values.iter().sum::<f64>() / n as f64,
            };
            points.push(SeriesPoint { date, value });
        }

        debug!(state, points = points.len(), "built time series");
        TimeSeries::new(state, points)
    }
}
