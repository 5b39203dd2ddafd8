use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AnalysisError, Result};

// ============================================================================
// Input Records
// ============================================================================

/// One daily residential consumption reading for a state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Residential_Consumption_kWh")]
    pub consumption_kwh: f64,
}

impl ConsumptionRecord {
    pub fn new(date: NaiveDate, state: impl Into<String>, consumption_kwh: f64) -> Self {
        Self {
            date,
            state: state.into(),
            consumption_kwh,
        }
    }

    /// Schema checks applied at load time
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.state.trim().is_empty() {
            return Err("state must not be empty".to_string());
        }
        if !self.consumption_kwh.is_finite() {
            return Err(format!(
                "consumption for {} on {} is not finite",
                self.state, self.date
            ));
        }
        if self.consumption_kwh < 0.0 {
            return Err(format!(
                "consumption for {} on {} is negative ({:.2} kWh)",
                self.state, self.date, self.consumption_kwh
            ));
        }
        Ok(())
    }
}

/// A calendar month used as the reporting/analysis window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportingWindow {
    pub year: i32,
    pub month: u32,
}

impl ReportingWindow {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(AnalysisError::Config(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for ReportingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.month, self.year)
    }
}

// ============================================================================
// Time Series
// ============================================================================

/// A single (date, value) observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Daily series for one state, strictly increasing by date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub state: String,
    points: Vec<SeriesPoint>,
}

impl TimeSeries {
    /// Build a series, rejecting unordered or duplicated dates
    pub fn new(state: impl Into<String>, points: Vec<SeriesPoint>) -> Result<Self> {
        let state = state.into();
        if let Some(pair) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(AnalysisError::model_fit(format!(
                "series for {} is not strictly increasing at {} -> {}",
                state, pair[0].date, pair[1].date
            )));
        }
        Ok(Self { state, points })
    }

    pub fn from_pairs(
        state: impl Into<String>,
        pairs: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self> {
        let points = pairs
            .into_iter()
            .map(|(date, value)| SeriesPoint { date, value })
            .collect();
        Self::new(state, points)
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Fail on the first NaN or infinite value
    pub fn ensure_finite(&self) -> Result<()> {
        match self.points.iter().find(|p| !p.value.is_finite()) {
            Some(p) => Err(AnalysisError::model_fit(format!(
                "non-finite value for {} on {}",
                self.state, p.date
            ))),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Pipeline Outputs
// ============================================================================

/// One predicted day beyond the observed history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_value: f64,
    /// Lower bound of the uncertainty interval
    pub lower: f64,
    /// Upper bound of the uncertainty interval
    pub upper: f64,
}

/// Per-observation anomaly verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyLabel {
    pub date: NaiveDate,
    pub value: f64,
    pub is_anomaly: bool,
    /// Isolation score in (0, 1]; higher is more anomalous
    pub score: f64,
}
