//! Additive trend + seasonality forecaster
//!
//! The model is `y(t) = trend(t) + Σ seasonal(t) + ε` where the trend is
//! piecewise linear with a set of potential changepoints and each seasonal
//! term is a truncated Fourier series. Gaussian priors on the coefficients
//! turn the fit into a ridge regression solved in closed form.
//!
//! Uncertainty intervals come from simulating future trend changes (at the
//! historical changepoint rate, Laplace-distributed magnitudes) plus
//! observation noise. The RNG is seeded, so a fit is fully reproducible.

use chrono::{Duration, NaiveDate};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::metrics::ForecastMetrics;
use super::seasonality::{auto_seasonalities, FourierSeasonality};
use super::{Forecast, Forecaster};
use crate::domain::{ForecastPoint, TimeSeries};
use crate::error::{AnalysisError, Result};
use crate::utils::quantile_sorted;

/// Prior scale on intercept and base slope
const TREND_PRIOR_SCALE: f64 = 5.0;
/// Lower bound on the noise variance (in scaled units) so the penalty never vanishes
const MIN_NOISE_VARIANCE: f64 = 1e-6;
/// Diagonal jitter keeping the normal equations positive definite
const RIDGE_JITTER: f64 = 1e-9;

/// Tuning for the additive model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditiveModelConfig {
    /// Days to forecast beyond the last observation
    pub horizon_days: usize,
    /// Fewer observations than this fail with `InsufficientData`
    pub min_observations: usize,
    pub n_changepoints: usize,
    /// Share of the history in which changepoints may be placed
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub weekly_fourier_order: usize,
    pub yearly_fourier_order: usize,
    /// Width of the uncertainty interval, e.g. 0.8 for 10%..90%
    pub interval_width: f64,
    /// Simulated paths for the interval; 0 disables sampling
    pub uncertainty_samples: usize,
    pub seed: u64,
}

impl Default for AdditiveModelConfig {
    fn default() -> Self {
        Self {
            horizon_days: 184,
            min_observations: 14,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            weekly_fourier_order: 3,
            yearly_fourier_order: 10,
            interval_width: 0.8,
            uncertainty_samples: 1000,
            seed: 42,
        }
    }
}

impl AdditiveModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_observations < 2 {
            return Err(AnalysisError::Config(
                "forecast.min_observations must be at least 2".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.changepoint_range) {
            return Err(AnalysisError::Config(
                "forecast.changepoint_range must be between 0 and 1".to_string(),
            ));
        }
        if self.changepoint_prior_scale <= 0.0 || self.seasonality_prior_scale <= 0.0 {
            return Err(AnalysisError::Config(
                "forecast prior scales must be positive".to_string(),
            ));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(AnalysisError::Config(
                "forecast.interval_width must be in (0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Coefficients and scaling of a fitted additive model
#[derive(Debug, Clone)]
pub struct FittedModel {
    first_date: NaiveDate,
    last_date: NaiveDate,
    span_days: f64,
    y_scale: f64,
    /// Changepoint locations on the scaled time axis
    changepoints: Vec<f64>,
    seasonalities: Vec<FourierSeasonality>,
    /// `[intercept, slope, deltas.., seasonal betas..]`
    beta: DVector<f64>,
    /// Residual standard deviation in scaled units
    sigma: f64,
}

impl FittedModel {
    pub fn last_date(&self) -> NaiveDate {
        self.last_date
    }

    pub fn changepoint_count(&self) -> usize {
        self.changepoints.len()
    }

    /// Slope adjustments at each changepoint
    pub fn deltas(&self) -> &[f64] {
        &self.beta.as_slice()[2..2 + self.changepoints.len()]
    }

    fn scaled_time(&self, date: NaiveDate) -> f64 {
        (date - self.first_date).num_days() as f64 / self.span_days
    }

    fn design_row(&self, date: NaiveDate) -> Vec<f64> {
        design_row(
            date,
            self.scaled_time(date),
            &self.changepoints,
            &self.seasonalities,
        )
    }

    /// Point prediction in kWh
    pub fn predict_value(&self, date: NaiveDate) -> f64 {
        let row = self.design_row(date);
        let scaled: f64 = row.iter().zip(self.beta.iter()).map(|(x, b)| x * b).sum();
        scaled * self.y_scale
    }

    /// Predictions with uncertainty bounds for every date given
    pub fn predict(&self, dates: &[NaiveDate], config: &AdditiveModelConfig) -> Result<Vec<ForecastPoint>> {
        let yhat: Vec<f64> = dates.iter().map(|d| self.predict_value(*d)).collect();

        if config.uncertainty_samples == 0 {
            return Ok(dates
                .iter()
                .zip(yhat)
                .map(|(date, v)| ForecastPoint {
                    date: *date,
                    predicted_value: v,
                    lower: v,
                    upper: v,
                })
                .collect());
        }

        let deviations = self.simulate_deviations(dates, config)?;
        let lo_q = (1.0 - config.interval_width) / 2.0;
        let hi_q = (1.0 + config.interval_width) / 2.0;

        Ok(dates
            .iter()
            .zip(yhat)
            .zip(deviations)
            .map(|((date, v), mut devs)| {
                devs.sort_by(f64::total_cmp);
                ForecastPoint {
                    date: *date,
                    predicted_value: v,
                    lower: v + quantile_sorted(&devs, lo_q) * self.y_scale,
                    upper: v + quantile_sorted(&devs, hi_q) * self.y_scale,
                }
            })
            .collect())
    }

    /// Per-date samples of (future trend drift + noise) in scaled units
    fn simulate_deviations(
        &self,
        dates: &[NaiveDate],
        config: &AdditiveModelConfig,
    ) -> Result<Vec<Vec<f64>>> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let ts: Vec<f64> = dates.iter().map(|d| self.scaled_time(*d)).collect();
        let t_end = ts.iter().copied().fold(1.0, f64::max);
        let future_span = t_end - 1.0;

        let deltas = self.deltas();
        let laplace_scale = if deltas.is_empty() {
            1e-8
        } else {
            deltas.iter().map(|d| d.abs()).sum::<f64>() / deltas.len() as f64 + 1e-8
        };
        // Changepoints per unit of scaled time, carried into the future
        let change_rate = self.changepoints.len() as f64 * future_span;
        let poisson = if change_rate > 0.0 {
            Some(Poisson::new(change_rate).map_err(|e| AnalysisError::model_fit(e.to_string()))?)
        } else {
            None
        };
        let noise =
            Normal::new(0.0, self.sigma).map_err(|e| AnalysisError::model_fit(e.to_string()))?;

        let mut samples = vec![Vec::with_capacity(config.uncertainty_samples); dates.len()];
        for _ in 0..config.uncertainty_samples {
            let n_changes = poisson
                .as_ref()
                .map(|p| p.sample(&mut rng) as usize)
                .unwrap_or(0);
            let changes: Vec<(f64, f64)> = (0..n_changes)
                .map(|_| {
                    let at = 1.0 + rng.gen::<f64>() * future_span;
                    (at, sample_laplace(&mut rng, laplace_scale))
                })
                .collect();

            for (i, t) in ts.iter().enumerate() {
                let drift: f64 = changes.iter().map(|(at, d)| d * (t - at).max(0.0)).sum();
                samples[i].push(drift + noise.sample(&mut rng));
            }
        }
        Ok(samples)
    }
}

/// Additive trend + seasonality forecaster
#[derive(Debug, Clone, Default)]
pub struct AdditiveForecaster {
    config: AdditiveModelConfig,
}

impl AdditiveForecaster {
    pub fn new(config: AdditiveModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdditiveModelConfig {
        &self.config
    }

    /// Fit a fresh model on the full history of a series
    pub fn fit(&self, series: &TimeSeries) -> Result<FittedModel> {
        let n = series.len();
        let needed = self.config.min_observations.max(2);
        if n < needed {
            return Err(AnalysisError::InsufficientData { needed, got: n });
        }
        series.ensure_finite()?;

        let points = series.points();
        let first_date = points[0].date;
        let last_date = points[n - 1].date;
        let span = (last_date - first_date).num_days();
        let span_days = span as f64;

        let y_scale = match points.iter().map(|p| p.value.abs()).fold(0.0, f64::max) {
            m if m > 0.0 => m,
            _ => 1.0,
        };
        let y = DVector::from_iterator(n, points.iter().map(|p| p.value / y_scale));
        let t: Vec<f64> = points
            .iter()
            .map(|p| (p.date - first_date).num_days() as f64 / span_days)
            .collect();

        let changepoints =
            place_changepoints(&t, self.config.n_changepoints, self.config.changepoint_range);
        let seasonalities = auto_seasonalities(
            span,
            self.config.weekly_fourier_order,
            self.config.yearly_fourier_order,
        );
        let n_cp = changepoints.len();
        let n_seasonal: usize = seasonalities.iter().map(|s| s.width()).sum();
        let p = 2 + n_cp + n_seasonal;

        let rows: Vec<Vec<f64>> = points
            .iter()
            .zip(&t)
            .map(|(pt, ti)| design_row(pt.date, *ti, &changepoints, &seasonalities))
            .collect();
        let x = DMatrix::from_fn(n, p, |i, j| rows[i][j]);

        // Noise level from a fit without changepoints
        let base_cols: Vec<usize> = (0..2).chain(2 + n_cp..p).collect();
        let x_base = x.select_columns(base_cols.iter());
        let beta_base = solve_ridge(&x_base, &y, &vec![RIDGE_JITTER; base_cols.len()])?;
        let rss_base = (&y - &x_base * &beta_base).norm_squared();
        let dof = n.saturating_sub(base_cols.len()).max(1) as f64;
        let noise_var = (rss_base / dof).max(MIN_NOISE_VARIANCE);

        let mut penalty = Vec::with_capacity(p);
        penalty.extend([noise_var / TREND_PRIOR_SCALE.powi(2); 2]);
        penalty.extend(std::iter::repeat(noise_var / self.config.changepoint_prior_scale.powi(2)).take(n_cp));
        penalty.extend(
            std::iter::repeat(noise_var / self.config.seasonality_prior_scale.powi(2)).take(n_seasonal),
        );
        let beta = solve_ridge(&x, &y, &penalty)?;

        let rss = (&y - &x * &beta).norm_squared();
        let sigma = (rss / n as f64).max(MIN_NOISE_VARIANCE).sqrt();

        debug!(
            state = %series.state,
            changepoints = n_cp,
            seasonal_terms = n_seasonal,
            sigma,
            "additive model solved"
        );

        Ok(FittedModel {
            first_date,
            last_date,
            span_days,
            y_scale,
            changepoints,
            seasonalities,
            beta,
            sigma,
        })
    }
}

impl Forecaster for AdditiveForecaster {
    fn forecast(&self, series: &TimeSeries, horizon_days: usize) -> Result<Forecast> {
        let model = self.fit(series)?;
        let last = model.last_date();

        // History and future are predicted together, then history is dropped
        let dates: Vec<NaiveDate> = series
            .points()
            .iter()
            .map(|p| p.date)
            .chain((1..=horizon_days as i64).map(|h| last + Duration::days(h)))
            .collect();
        let frame = model.predict(&dates, &self.config)?;

        let actual = series.values();
        let fitted: Vec<f64> = frame[..series.len()].iter().map(|p| p.predicted_value).collect();
        let fit_metrics = ForecastMetrics::calculate(&actual, &fitted).ok();

        let points: Vec<ForecastPoint> = frame.into_iter().filter(|p| p.date > last).collect();

        info!(
            state = %series.state,
            observations = series.len(),
            horizon_days,
            points = points.len(),
            "forecast generated"
        );

        Ok(Forecast {
            state: series.state.clone(),
            points,
            fit_metrics,
        })
    }
}

fn design_row(
    date: NaiveDate,
    t: f64,
    changepoints: &[f64],
    seasonalities: &[FourierSeasonality],
) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 + changepoints.len() + 16);
    row.push(1.0);
    row.push(t);
    row.extend(changepoints.iter().map(|s| (t - s).max(0.0)));
    for s in seasonalities {
        s.push_features(date, &mut row);
    }
    row
}

/// Evenly spaced changepoints over the first `range` share of the history
fn place_changepoints(t: &[f64], n_changepoints: usize, range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * range).floor() as usize;
    let n_cp = n_changepoints.min(hist_size.saturating_sub(1));
    if n_cp == 0 {
        return Vec::new();
    }
    let step = (hist_size - 1) as f64 / n_cp as f64;
    (1..=n_cp)
        .map(|i| t[(i as f64 * step).round() as usize])
        .collect()
}

/// Solve `(XᵀX + diag(penalty)) β = Xᵀy`
fn solve_ridge(x: &DMatrix<f64>, y: &DVector<f64>, penalty: &[f64]) -> Result<DVector<f64>> {
    let mut gram = x.transpose() * x;
    for (j, lambda) in penalty.iter().enumerate() {
        gram[(j, j)] += lambda + RIDGE_JITTER;
    }
    let rhs = x.transpose() * y;
    let beta = gram
        .cholesky()
        .map(|c| c.solve(&rhs))
        .ok_or_else(|| AnalysisError::model_fit("normal equations are not positive definite"))?;
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(AnalysisError::model_fit("non-finite model coefficients"));
    }
    Ok(beta)
}

fn sample_laplace(rng: &mut StdRng, scale: f64) -> f64 {
    let u: f64 = rng.gen_range(-0.5..0.5);
    -scale * u.signum() * (1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE).ln()
}
