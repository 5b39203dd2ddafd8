//! Fourier seasonality terms for the additive model

use chrono::{Datelike, NaiveDate};
use std::f64::consts::PI;

/// `num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A periodic component expressed as a truncated Fourier series
#[derive(Debug, Clone, PartialEq)]
pub struct FourierSeasonality {
    pub name: &'static str,
    pub period_days: f64,
    pub order: usize,
}

impl FourierSeasonality {
    pub fn weekly(order: usize) -> Self {
        Self {
            name: "weekly",
            period_days: 7.0,
            order,
        }
    }

    pub fn yearly(order: usize) -> Self {
        Self {
            name: "yearly",
            period_days: 365.25,
            order,
        }
    }

    /// Number of design-matrix columns (one sin and one cos per order)
    pub fn width(&self) -> usize {
        2 * self.order
    }

    /// Append `[sin(2πkt/P), cos(2πkt/P)]` for k = 1..=order
    pub fn push_features(&self, date: NaiveDate, out: &mut Vec<f64>) {
        let t = days_since_epoch(date);
        for k in 1..=self.order {
            let x = 2.0 * PI * k as f64 * t / self.period_days;
            out.push(x.sin());
            out.push(x.cos());
        }
    }
}

/// Seasonalities that make sense for a history spanning `span_days`
///
/// Weekly needs two full weeks; yearly needs two full years.
pub fn auto_seasonalities(span_days: i64, weekly_order: usize, yearly_order: usize) -> Vec<FourierSeasonality> {
    let mut out = Vec::new();
    if span_days >= 730 && yearly_order > 0 {
        out.push(FourierSeasonality::yearly(yearly_order));
    }
    if span_days >= 14 && weekly_order > 0 {
        out.push(FourierSeasonality::weekly(weekly_order));
    }
    out
}

fn days_since_epoch(date: NaiveDate) -> f64 {
    (date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE) as f64
}
