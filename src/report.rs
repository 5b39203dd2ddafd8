//! Forecast report and threshold alert
//!
//! `ReportFormatter` is pure: forecast points in, CSV text and mean out.
//! `ForecastAlert` is the delivery-side adapter that composes the message a
//! transport would send; it does no I/O itself.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::ForecastPoint;
use crate::error::{AnalysisError, Result};
use crate::utils::mean;

pub const REPORT_DATE_HEADER: &str = "Date";
pub const REPORT_VALUE_HEADER: &str = "Forecast_kWh";
pub const REPORT_ATTACHMENT_NAME: &str = "forecast_report.csv";

/// Tabular forecast plus its summary statistic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    /// `Date,Forecast_kWh` CSV, one row per forecast day
    pub tabular_text: String,
    /// Mean predicted daily consumption; 0.0 when there are no points
    pub mean_value: f64,
}

pub struct ReportFormatter;

impl ReportFormatter {
    pub fn format(points: &[ForecastPoint]) -> Result<ForecastReport> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record([REPORT_DATE_HEADER, REPORT_VALUE_HEADER])?;
        for p in points {
            wtr.write_record([
                p.date.format("%Y-%m-%d").to_string(),
                p.predicted_value.to_string(),
            ])?;
        }

        let data = wtr
            .into_inner()
            .map_err(|e| AnalysisError::Io(e.into_error()))?;
        let tabular_text = String::from_utf8(data)
            .map_err(|e| AnalysisError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let values: Vec<f64> = points.iter().map(|p| p.predicted_value).collect();
        Ok(ForecastReport {
            tabular_text,
            mean_value: mean(&values),
        })
    }
}

/// Notification content ready for a mail transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
    pub attachment_csv: String,
    pub exceeds_threshold: bool,
}

pub struct ForecastAlert;

impl ForecastAlert {
    /// Strictly greater than the threshold counts as exceeding it
    pub fn exceeds(report: &ForecastReport, threshold_kwh: f64) -> bool {
        report.mean_value > threshold_kwh
    }

    pub fn compose(
        state: &str,
        points: &[ForecastPoint],
        report: &ForecastReport,
        threshold_kwh: f64,
    ) -> AlertMessage {
        let span = forecast_span_label(points);
        let exceeds = Self::exceeds(report, threshold_kwh);

        let mut body = format!(
            "Hello,\n\nPlease find attached the electricity forecast for {} for {}.\n\n\
             Average Daily Forecast: {:.2} kWh.\n",
            state, span, report.mean_value
        );
        if exceeds {
            body.push_str(&format!(
                "Alert: Forecasted load exceeds your threshold of {} kWh!\n",
                threshold_kwh
            ));
        }
        body.push_str("\nRegards,\nSmart Meter Analyzer");

        AlertMessage {
            subject: format!("Electricity Forecast Report - {} ({})", state, span),
            body,
            attachment_name: REPORT_ATTACHMENT_NAME.to_string(),
            attachment_csv: report.tabular_text.clone(),
            exceeds_threshold: exceeds,
        }
    }
}

/// `Jul-Dec 2025`, or `Nov 2025-Feb 2026` across years
pub fn forecast_span_label(points: &[ForecastPoint]) -> String {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) => span_label(first.date, last.date),
        _ => "no forecast period".to_string(),
    }
}

fn span_label(first: NaiveDate, last: NaiveDate) -> String {
    if first.year() != last.year() {
        format!("{}-{}", first.format("%b %Y"), last.format("%b %Y"))
    } else if first.month() == last.month() {
        first.format("%b %Y").to_string()
    } else {
        format!("{}-{} {}", first.format("%b"), last.format("%b"), last.year())
    }
}
