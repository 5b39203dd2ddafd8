//! One dashboard analysis run
//!
//! Comparison slice and cost summary for every selected state; forecast,
//! report and anomaly sections when exactly one state is selected. Sections
//! that lack data are skipped, model failures become warnings.

use serde::Serialize;
use tracing::{info, warn};

use crate::anomaly::{anomaly_count, AnomalyDetector, IsolationForestDetector};
use crate::config::{AnalysisConfig, Config};
use crate::cost::{summarize_state, HouseholdTable, StateCostSummary};
use crate::domain::{AnomalyLabel, ConsumptionRecord, ConsumptionTable, ReportingWindow};
use crate::error::{AnalysisError, Result};
use crate::forecast::{AdditiveForecaster, Forecast, Forecaster, TimeSeriesBuilder};
use crate::report::{AlertMessage, ForecastAlert, ForecastReport, ReportFormatter};

/// User selections for one run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub window: ReportingWindow,
    pub states: Vec<String>,
    pub tariff_per_kwh: f64,
    pub threshold_kwh: f64,
}

impl AnalysisRequest {
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            window: ReportingWindow::new(config.year, config.month)?,
            states: config.states.clone(),
            tariff_per_kwh: config.tariff_per_kwh,
            threshold_kwh: config.threshold_kwh,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastSection {
    pub forecast: Forecast,
    pub report: ForecastReport,
    pub alert: AlertMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalySection {
    pub state: String,
    pub labels: Vec<AnomalyLabel>,
    pub anomaly_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub window: ReportingWindow,
    pub states: Vec<String>,
    pub comparison: Vec<ConsumptionRecord>,
    pub cost_summary: Vec<StateCostSummary>,
    pub forecast: Option<ForecastSection>,
    pub anomalies: Option<AnomalySection>,
    /// Model failures surfaced to the user
    pub warnings: Vec<String>,
}

pub struct AnalysisEngine {
    pub builder: TimeSeriesBuilder,
    pub forecaster: Box<dyn Forecaster>,
    pub detector: Box<dyn AnomalyDetector>,
    pub households: HouseholdTable,
    pub horizon_days: usize,
}

impl AnalysisEngine {
    pub fn new(
        builder: TimeSeriesBuilder,
        forecaster: Box<dyn Forecaster>,
        detector: Box<dyn AnomalyDetector>,
        households: HouseholdTable,
        horizon_days: usize,
    ) -> Self {
        Self {
            builder,
            forecaster,
            detector,
            households,
            horizon_days,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            TimeSeriesBuilder::new(config.data.duplicate_policy),
            Box::new(AdditiveForecaster::new(config.forecast.clone())),
            Box::new(IsolationForestDetector::new(config.anomaly.clone())),
            HouseholdTable::from_config(&config.households)?,
            config.forecast.horizon_days,
        ))
    }

    pub fn run(&self, table: &ConsumptionTable, request: &AnalysisRequest) -> Result<AnalysisReport> {
        let window = request.window;
        let in_window = table.window_records(window);
        let Some(first) = in_window.first() else {
            return Err(AnalysisError::NoData {
                year: window.year,
                month: window.month,
            });
        };

        let states = if request.states.is_empty() {
            vec![first.state.clone()]
        } else {
            request.states.clone()
        };
        info!(window = %window, states = ?states, "starting analysis");

        let mut warnings = Vec::new();
        let comparison = table.compare(window, &states);

        let mut cost_summary = Vec::with_capacity(states.len());
        for state in &states {
            let result = summarize_state(table, window, state, &self.households, request.tariff_per_kwh);
            if let Some(row) = section(result, "cost summary", state, window, &mut warnings)? {
                cost_summary.push(row);
            }
        }

        let (forecast, anomalies) = match states.as_slice() {
            [state] => {
                let forecast = section(
                    self.forecast_section(table, state, request.threshold_kwh),
                    "forecast",
                    state,
                    window,
                    &mut warnings,
                )?;
                let anomalies = section(
                    self.anomaly_section(table, state, window),
                    "anomaly detection",
                    state,
                    window,
                    &mut warnings,
                )?;
                (forecast, anomalies)
            }
            _ => (None, None),
        };

        Ok(AnalysisReport {
            window,
            states,
            comparison,
            cost_summary,
            forecast,
            anomalies,
            warnings,
        })
    }

    fn forecast_section(
        &self,
        table: &ConsumptionTable,
        state: &str,
        threshold_kwh: f64,
    ) -> Result<ForecastSection> {
        let series = self.builder.build(table, state)?;
        let forecast = self.forecaster.forecast(&series, self.horizon_days)?;
        let report = ReportFormatter::format(&forecast.points)?;
        let alert = ForecastAlert::compose(state, &forecast.points, &report, threshold_kwh);
        if alert.exceeds_threshold {
            info!(state, mean_kwh = report.mean_value, threshold_kwh, "forecast exceeds threshold");
        }
        Ok(ForecastSection {
            forecast,
            report,
            alert,
        })
    }

    fn anomaly_section(
        &self,
        table: &ConsumptionTable,
        state: &str,
        window: ReportingWindow,
    ) -> Result<AnomalySection> {
        let series = self.builder.build_window(table, state, window)?;
        let labels = self.detector.detect(&series)?;
        Ok(AnomalySection {
            state: state.to_string(),
            anomaly_count: anomaly_count(&labels),
            labels,
        })
    }
}

/// Apply the section policy: skip on missing data, warn on model failure
fn section<T>(
    result: Result<T>,
    what: &str,
    state: &str,
    window: ReportingWindow,
    warnings: &mut Vec<String>,
) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_skippable() => {
            info!(section = what, state, window = %window, error = %e, "section skipped");
            Ok(None)
        }
        Err(AnalysisError::ModelFit(reason)) => {
            warn!(section = what, state, window = %window, %reason, "model fit failed");
            warnings.push(format!("{} for {} ({}) failed: {}", what, state, window, reason));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{AdditiveModelConfig, DuplicatePolicy};
    use chrono::{Duration, NaiveDate};

    fn table() -> ConsumptionTable {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut records = Vec::new();
        for i in 0..60 {
            let date = start + Duration::days(i);
            records.push(ConsumptionRecord::new(date, "Bihar", 400.0 + i as f64 + (i % 7) as f64));
            records.push(ConsumptionRecord::new(date, "Gujarat", 300.0 + (i % 3) as f64));
        }
        // Only a handful of days: too short to forecast
        for i in 0..5 {
            records.push(ConsumptionRecord::new(start + Duration::days(i), "Tamil Nadu", 250.0));
        }
        ConsumptionTable::from_records(records).unwrap()
    }

    fn engine() -> AnalysisEngine {
        let config = Config {
            forecast: AdditiveModelConfig {
                uncertainty_samples: 20,
                horizon_days: 31,
                ..Default::default()
            },
            ..Default::default()
        };
        AnalysisEngine::from_config(&config).unwrap()
    }

    fn request(states: &[&str]) -> AnalysisRequest {
        AnalysisRequest {
            window: ReportingWindow::new(2025, 1).unwrap(),
            states: states.iter().map(|s| s.to_string()).collect(),
            tariff_per_kwh: 5.88,
            threshold_kwh: 400.0,
        }
    }

    #[test]
    fn test_single_state_runs_every_section() {
        let report = engine().run(&table(), &request(&["Bihar"])).unwrap();

        assert_eq!(report.comparison.len(), 31);
        assert_eq!(report.cost_summary.len(), 1);

        let forecast = report.forecast.unwrap();
        assert_eq!(forecast.forecast.points.len(), 31);
        assert_eq!(
            forecast.forecast.points[0].date,
            NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
        );
        assert!(forecast.alert.exceeds_threshold);

        let anomalies = report.anomalies.unwrap();
        assert_eq!(anomalies.labels.len(), 31);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_default_selection_is_first_state_in_window() {
        let report = engine().run(&table(), &request(&[])).unwrap();
        assert_eq!(report.states, vec!["Bihar".to_string()]);
    }

    #[test]
    fn test_multiple_states_skip_model_sections() {
        let report = engine().run(&table(), &request(&["Bihar", "Gujarat"])).unwrap();
        assert_eq!(report.cost_summary.len(), 2);
        assert!(report.forecast.is_none());
        assert!(report.anomalies.is_none());
    }

    #[test]
    fn test_short_history_skips_forecast_quietly() {
        let report = engine().run(&table(), &request(&["Tamil Nadu"])).unwrap();
        assert!(report.forecast.is_none());
        // 5 points is below the detector's minimum, so everything is normal
        assert_eq!(report.anomalies.unwrap().anomaly_count, 0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_unknown_state_is_skipped() {
        let report = engine().run(&table(), &request(&["Goa"])).unwrap();
        assert!(report.comparison.is_empty());
        assert!(report.cost_summary.is_empty());
        assert!(report.forecast.is_none());
        assert!(report.anomalies.is_none());
    }

    #[test]
    fn test_model_failure_becomes_warning() {
        let mut config = Config::default();
        config.data.duplicate_policy = DuplicatePolicy::Reject;
        let engine = AnalysisEngine::from_config(&config).unwrap();

        let mut records = table().records().to_vec();
        records.push(records[0].clone());
        let dup_table = ConsumptionTable::from_records(records).unwrap();

        let report = engine.run(&dup_table, &request(&["Bihar"])).unwrap();
        assert!(report.forecast.is_none());
        assert!(report.anomalies.is_none());
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("Bihar"));
        assert!(report.warnings[0].contains("1/2025"));
    }

    #[test]
    fn test_empty_window_is_an_error() {
        let mut req = request(&["Bihar"]);
        req.window = ReportingWindow::new(2025, 9).unwrap();
        assert!(matches!(
            engine().run(&table(), &req),
            Err(AnalysisError::NoData { year: 2025, month: 9 })
        ));
    }
}
