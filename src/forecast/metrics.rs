//! Forecast fit diagnostics
//!
//! In-sample accuracy of a fitted model: MAE, RMSE, MAPE and R².

use serde::{Deserialize, Serialize};
use std::fmt;

/// Accuracy of fitted values against the observed history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Square Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error (%)
    pub mape: f64,
    /// R² (coefficient of determination)
    pub r2: f64,
    pub sample_count: usize,
    pub max_error: f64,
}

impl ForecastMetrics {
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self, ForecastMetricsError> {
        if actual.len() != predicted.len() {
            return Err(ForecastMetricsError::DimensionMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }
        if actual.is_empty() {
            return Err(ForecastMetricsError::EmptyData);
        }

        let n = actual.len() as f64;
        let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();

        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let sse: f64 = errors.iter().map(|e| e * e).sum();
        let rmse = (sse / n).sqrt();

        // Zero readings are left out of MAPE
        let pct: Vec<f64> = actual
            .iter()
            .zip(&errors)
            .filter(|(a, _)| a.abs() > 1e-6)
            .map(|(a, e)| e.abs() / a.abs() * 100.0)
            .collect();
        let mape = if pct.is_empty() {
            0.0
        } else {
            pct.iter().sum::<f64>() / pct.len() as f64
        };

        let mean_actual = actual.iter().sum::<f64>() / n;
        let sst: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
        let r2 = if sst > 1e-10 { 1.0 - sse / sst } else { 0.0 };

        let max_error = errors.iter().map(|e| e.abs()).fold(0.0f64, f64::max);

        Ok(ForecastMetrics {
            mae,
            rmse,
            mape,
            r2,
            sample_count: actual.len(),
            max_error,
        })
    }

    pub fn quality(&self) -> ForecastQuality {
        if self.mape < 5.0 {
            ForecastQuality::Excellent
        } else if self.mape < 10.0 {
            ForecastQuality::Good
        } else if self.mape < 20.0 {
            ForecastQuality::Fair
        } else if self.mape < 50.0 {
            ForecastQuality::Poor
        } else {
            ForecastQuality::VeryPoor
        }
    }

    /// MAPE under 20%, R² above 0.5 and at least two weeks of history
    pub fn is_reliable(&self) -> bool {
        self.mape < 20.0 && self.r2 > 0.5 && self.sample_count >= 14
    }
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Metrics: MAE={:.3}, RMSE={:.3}, MAPE={:.2}%, R²={:.3}, Quality={:?}",
            self.mae,
            self.rmse,
            self.mape,
            self.r2,
            self.quality()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastQuality {
    Excellent, // MAPE < 5%
    Good,      // MAPE 5-10%
    Fair,      // MAPE 10-20%
    Poor,      // MAPE 20-50%
    VeryPoor,  // MAPE > 50%
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ForecastMetricsError {
    #[error("Dimension mismatch: actual={actual}, predicted={predicted}")]
    DimensionMismatch { actual: usize, predicted: usize },

    #[error("Empty data provided")]
    EmptyData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_fit() {
        let actual = vec![100.0, 110.0, 120.0, 130.0];
        let metrics = ForecastMetrics::calculate(&actual, &actual).unwrap();

        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.mape, 0.0);
        assert!((metrics.r2 - 1.0).abs() < 1e-12);
        assert_eq!(metrics.quality(), ForecastQuality::Excellent);
    }

    #[test]
    fn test_known_errors() {
        let actual = vec![100.0, 200.0];
        let predicted = vec![110.0, 180.0];
        let metrics = ForecastMetrics::calculate(&actual, &predicted).unwrap();

        assert!((metrics.mae - 15.0).abs() < 1e-9);
        assert!((metrics.rmse - 250.0f64.sqrt()).abs() < 1e-9);
        assert!((metrics.mape - 10.0).abs() < 1e-9);
        assert!((metrics.max_error - 20.0).abs() < 1e-9);
        assert_eq!(metrics.quality(), ForecastQuality::Fair);
    }

    #[test]
    fn test_zero_actuals_skip_mape() {
        let metrics = ForecastMetrics::calculate(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
        assert_eq!(metrics.mape, 0.0);
        assert_eq!(metrics.r2, 0.0);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            ForecastMetrics::calculate(&[1.0], &[1.0, 2.0]),
            Err(ForecastMetricsError::DimensionMismatch { actual: 1, predicted: 2 })
        ));
        assert!(matches!(
            ForecastMetrics::calculate(&[], &[]),
            Err(ForecastMetricsError::EmptyData)
        ));
    }

    #[test]
    fn test_reliability_needs_two_weeks() {
        let actual: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let predicted: Vec<f64> = actual.iter().map(|a| a + 0.5).collect();
        let metrics = ForecastMetrics::calculate(&actual, &predicted).unwrap();
        assert!(!metrics.is_reliable());
    }
}
