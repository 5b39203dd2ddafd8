//! Isolation forest over a single feature
//!
//! Each tree recursively splits a random subsample at uniformly drawn
//! thresholds until every point is isolated or the height limit is hit.
//! Outliers are isolated in fewer splits, so a short average path yields a
//! high score `s = 2^(-E[h(x)] / c(ψ))`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::AnomalyDetector;
use crate::domain::{AnomalyLabel, TimeSeries};
use crate::error::{AnalysisError, Result};
use crate::utils::quantile_sorted;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Score assigned when no model is trained (window too small)
const NEUTRAL_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationForestConfig {
    /// Expected share of outliers in a window
    pub contamination: f64,
    pub n_estimators: usize,
    /// Upper bound on each tree's subsample
    pub max_samples: usize,
    /// Windows smaller than this are reported as all-normal
    pub min_points: usize,
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            contamination: 0.03,
            n_estimators: 100,
            max_samples: 256,
            min_points: 10,
            seed: 42,
        }
    }
}

impl IsolationForestConfig {
    pub fn validate(&self) -> Result<()> {
        if !contamination_in_range(self.contamination) {
            return Err(AnalysisError::Config(format!(
                "anomaly.contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_estimators == 0 {
            return Err(AnalysisError::Config(
                "anomaly.n_estimators must be positive".to_string(),
            ));
        }
        if self.max_samples < 2 || self.min_points < 2 {
            return Err(AnalysisError::Config(
                "anomaly.max_samples and anomaly.min_points must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

fn contamination_in_range(c: f64) -> bool {
    c > 0.0 && c <= 0.5
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Split {
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(sample: &[f64], height_limit: usize, rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        build_node(&mut nodes, sample, 0, height_limit, rng);
        Self { nodes }
    }

    fn path_length(&self, x: f64) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes[idx] {
                Node::Split {
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x < threshold { left } else { right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(size),
            }
        }
    }
}

fn build_node(
    nodes: &mut Vec<Node>,
    values: &[f64],
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> usize {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));

    let idx = nodes.len();
    nodes.push(Node::Leaf { size: values.len() });
    if depth >= height_limit || values.len() <= 1 || min >= max {
        return idx;
    }

    let threshold = rng.gen_range(min..max);
    let (left, right): (Vec<f64>, Vec<f64>) = values.iter().copied().partition(|v| *v < threshold);
    let left = build_node(nodes, &left, depth + 1, height_limit, rng);
    let right = build_node(nodes, &right, depth + 1, height_limit, rng);
    nodes[idx] = Node::Split {
        threshold,
        left,
        right,
    };
    idx
}

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// A trained forest; lives only for the duration of one detection call
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    subsample_size: usize,
}

impl IsolationForest {
    pub fn fit(values: &[f64], config: &IsolationForestConfig) -> Result<Self> {
        if values.len() < 2 {
            return Err(AnalysisError::InsufficientData {
                needed: 2,
                got: values.len(),
            });
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(AnalysisError::model_fit(format!(
                "non-finite value {} in isolation forest input",
                v
            )));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let subsample_size = config.max_samples.min(values.len()).max(2);
        let height_limit = (subsample_size as f64).log2().ceil() as usize;

        let trees = (0..config.n_estimators.max(1))
            .map(|_| {
                let sample: Vec<f64> =
                    rand::seq::index::sample(&mut rng, values.len(), subsample_size)
                        .iter()
                        .map(|i| values[i])
                        .collect();
                IsolationTree::grow(&sample, height_limit, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            subsample_size,
        })
    }

    /// Anomaly score in (0, 1]; 0.5 means no distinct anomaly
    pub fn score(&self, x: f64) -> f64 {
        let mean_path = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_path / average_path_length(self.subsample_size))
    }
}

/// Isolation-forest detector thresholded by a fixed contamination rate
#[derive(Debug, Clone, Default)]
pub struct IsolationForestDetector {
    config: IsolationForestConfig,
}

impl IsolationForestDetector {
    pub fn new(config: IsolationForestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IsolationForestConfig {
        &self.config
    }
}

impl AnomalyDetector for IsolationForestDetector {
    fn detect(&self, series: &TimeSeries) -> Result<Vec<AnomalyLabel>> {
        series.ensure_finite()?;
        if !contamination_in_range(self.config.contamination) {
            return Err(AnalysisError::model_fit(format!(
                "contamination {} outside (0, 0.5]",
                self.config.contamination
            )));
        }

        if series.len() < self.config.min_points {
            debug!(
                state = %series.state,
                points = series.len(),
                min_points = self.config.min_points,
                "window too small for anomaly model, reporting all normal"
            );
            return Ok(series
                .points()
                .iter()
                .map(|p| AnomalyLabel {
                    date: p.date,
                    value: p.value,
                    is_anomaly: false,
                    score: NEUTRAL_SCORE,
                })
                .collect());
        }

        let values = series.values();
        let forest = IsolationForest::fit(&values, &self.config)?;
        let scores: Vec<f64> = values.iter().map(|v| forest.score(*v)).collect();

        let mut sorted = scores.clone();
        sorted.sort_by(f64::total_cmp);
        let threshold = quantile_sorted(&sorted, 1.0 - self.config.contamination);

        let labels: Vec<AnomalyLabel> = series
            .points()
            .iter()
            .zip(scores)
            .map(|(p, score)| AnomalyLabel {
                date: p.date,
                value: p.value,
                is_anomaly: score > threshold,
                score,
            })
            .collect();

        info!(
            state = %series.state,
            points = labels.len(),
            anomalies = super::anomaly_count(&labels),
            threshold,
            "anomaly detection complete"
        );
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::anomaly_count;
    use chrono::{Duration, NaiveDate};
    use rstest::rstest;

    fn series(values: &[f64]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        TimeSeries::from_pairs(
            "Test",
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::days(i as i64), *v)),
        )
        .unwrap()
    }

    fn noisy_with_spike() -> Vec<f64> {
        let mut values: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
        values[17] = 480.0;
        values
    }

    #[test]
    fn test_one_label_per_point_in_order() {
        let ts = series(&noisy_with_spike());
        let labels = IsolationForestDetector::default().detect(&ts).unwrap();
        assert_eq!(labels.len(), ts.len());
        for (label, point) in labels.iter().zip(ts.points()) {
            assert_eq!(label.date, point.date);
            assert_eq!(label.value, point.value);
        }
    }

    #[test]
    fn test_constant_series_has_no_anomalies() {
        let labels = IsolationForestDetector::default()
            .detect(&series(&[100.0; 30]))
            .unwrap();
        assert_eq!(anomaly_count(&labels), 0);
    }

    #[test]
    fn test_spike_is_flagged() {
        let labels = IsolationForestDetector::default()
            .detect(&series(&noisy_with_spike()))
            .unwrap();
        assert!(labels[17].is_anomaly);
        assert_eq!(anomaly_count(&labels), 1);
        assert!(labels[17].score > labels[0].score);
    }

    #[test]
    fn test_small_window_falls_back_to_normal() {
        let labels = IsolationForestDetector::default()
            .detect(&series(&[1.0, 2.0, 500.0]))
            .unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(anomaly_count(&labels), 0);
    }

    #[test]
    fn test_non_finite_input_fails() {
        let mut values = noisy_with_spike();
        values[3] = f64::INFINITY;
        let err = IsolationForestDetector::default()
            .detect(&series(&values))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ModelFit(_)));
    }

    #[test]
    fn test_detection_is_reproducible() {
        let ts = series(&noisy_with_spike());
        let detector = IsolationForestDetector::default();
        assert_eq!(detector.detect(&ts).unwrap(), detector.detect(&ts).unwrap());
    }

    #[rstest]
    #[case(0.0)]
    #[case(0.6)]
    #[case(-0.1)]
    fn test_bad_contamination(#[case] contamination: f64) {
        let config = IsolationForestConfig {
            contamination,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let err = IsolationForestDetector::new(config)
            .detect(&series(&noisy_with_spike()))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ModelFit(_)));
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!((average_path_length(256) - 10.2448).abs() < 1e-3);
    }
}
