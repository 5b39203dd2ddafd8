//! Per-household cost estimates
//!
//! Monthly totals are divided across an estimated household count per state
//! and priced at a flat tariff. The household table is configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::{ConsumptionTable, ReportingWindow};
use crate::error::{AnalysisError, Result};

/// Average persons per household used for the built-in estimates
pub const PERSONS_PER_HOUSEHOLD: f64 = 4.5;

/// Default flat residential tariff (₹/kWh)
pub const DEFAULT_TARIFF_PER_KWH: f64 = 5.88;

const STATE_POPULATIONS: [(&str, u64); 10] = [
    ("Uttar Pradesh", 250_000_000),
    ("Maharashtra", 125_000_000),
    ("Bihar", 130_000_000),
    ("West Bengal", 100_000_000),
    ("Madhya Pradesh", 85_000_000),
    ("Tamil Nadu", 80_000_000),
    ("Rajasthan", 80_000_000),
    ("Karnataka", 70_000_000),
    ("Gujarat", 70_000_000),
    ("Andhra Pradesh", 55_000_000),
];

/// Household table settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseholdConfig {
    /// Start from the population-derived estimates
    pub use_builtin_estimates: bool,
    /// Explicit counts; these win over the estimates
    pub counts: BTreeMap<String, u64>,
}

impl Default for HouseholdConfig {
    fn default() -> Self {
        Self {
            use_builtin_estimates: true,
            counts: BTreeMap::new(),
        }
    }
}

/// Household count per state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HouseholdTable {
    counts: BTreeMap<String, u64>,
}

impl HouseholdTable {
    pub fn new(counts: BTreeMap<String, u64>) -> Result<Self> {
        if let Some((state, _)) = counts.iter().find(|(_, c)| **c == 0) {
            return Err(AnalysisError::Config(format!(
                "household count for {} must be positive",
                state
            )));
        }
        Ok(Self { counts })
    }

    /// Population / 4.5 estimates for the ten largest states
    pub fn builtin_estimates() -> Self {
        let counts = STATE_POPULATIONS
            .iter()
            .map(|(state, pop)| {
                let households = (*pop as f64 / PERSONS_PER_HOUSEHOLD).floor() as u64;
                (state.to_string(), households)
            })
            .collect();
        Self { counts }
    }

    pub fn from_config(config: &HouseholdConfig) -> Result<Self> {
        let mut counts = if config.use_builtin_estimates {
            Self::builtin_estimates().counts
        } else {
            BTreeMap::new()
        };
        counts.extend(config.counts.iter().map(|(k, v)| (k.clone(), *v)));
        Self::new(counts)
    }

    pub fn get(&self, state: &str) -> Option<u64> {
        self.counts.get(state).copied()
    }

    pub fn households(&self, state: &str) -> Result<u64> {
        self.get(state)
            .ok_or_else(|| AnalysisError::UnknownState(state.to_string()))
    }
}

/// Cost summary row for one state and window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCostSummary {
    pub state: String,
    pub total_consumption_kwh: f64,
    pub households: u64,
    pub avg_consumption_per_household_kwh: f64,
    pub estimated_cost_per_household: f64,
}

/// Summarise one state's consumption in a window
pub fn summarize_state(
    table: &ConsumptionTable,
    window: ReportingWindow,
    state: &str,
    households: &HouseholdTable,
    tariff_per_kwh: f64,
) -> Result<StateCostSummary> {
    let count = households.households(state)?;
    let total: f64 = table
        .state_records(state)
        .filter(|r| window.contains(r.date))
        .map(|r| r.consumption_kwh)
        .sum();

    let avg = total / count as f64;
    debug!(state, window = %window, total_kwh = total, households = count, "cost summary");

    Ok(StateCostSummary {
        state: state.to_string(),
        total_consumption_kwh: total,
        households: count,
        avg_consumption_per_household_kwh: avg,
        estimated_cost_per_household: avg * tariff_per_kwh,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConsumptionRecord;
    use chrono::NaiveDate;

    fn table() -> ConsumptionTable {
        let d = |m, day| NaiveDate::from_ymd_opt(2025, m, day).unwrap();
        ConsumptionTable::from_records(vec![
            ConsumptionRecord::new(d(1, 1), "Bihar", 600.0),
            ConsumptionRecord::new(d(1, 2), "Bihar", 400.0),
            ConsumptionRecord::new(d(2, 1), "Bihar", 9999.0),
            ConsumptionRecord::new(d(1, 1), "Goa", 50.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_builtin_estimates() {
        let table = HouseholdTable::builtin_estimates();
        assert_eq!(table.get("Uttar Pradesh"), Some(55_555_555));
        assert_eq!(table.get("Andhra Pradesh"), Some(12_222_222));
        assert_eq!(table.get("Goa"), None);
    }

    #[test]
    fn test_config_overrides_and_extends() {
        let mut counts = BTreeMap::new();
        counts.insert("Goa".to_string(), 400_000);
        counts.insert("Bihar".to_string(), 1_000);
        let table = HouseholdTable::from_config(&HouseholdConfig {
            use_builtin_estimates: true,
            counts,
        })
        .unwrap();
        assert_eq!(table.get("Goa"), Some(400_000));
        assert_eq!(table.get("Bihar"), Some(1_000));
        assert!(table.get("Gujarat").is_some());
    }

    #[test]
    fn test_zero_households_rejected() {
        let mut counts = BTreeMap::new();
        counts.insert("Goa".to_string(), 0);
        assert!(matches!(
            HouseholdTable::new(counts),
            Err(AnalysisError::Config(_))
        ));
    }

    #[test]
    fn test_summary_arithmetic() {
        let mut counts = BTreeMap::new();
        counts.insert("Bihar".to_string(), 200);
        let households = HouseholdTable::new(counts).unwrap();
        let jan = ReportingWindow::new(2025, 1).unwrap();

        let row = summarize_state(&table(), jan, "Bihar", &households, 5.0).unwrap();
        assert_eq!(row.total_consumption_kwh, 1000.0);
        assert_eq!(row.households, 200);
        assert!((row.avg_consumption_per_household_kwh - 5.0).abs() < 1e-12);
        assert!((row.estimated_cost_per_household - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_household_count() {
        let jan = ReportingWindow::new(2025, 1).unwrap();
        let err = summarize_state(&table(), jan, "Goa", &HouseholdTable::builtin_estimates(), 5.88)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownState(_)));
    }
}
