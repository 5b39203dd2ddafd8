//! Residential smart meter analyzer
//!
//! Analytical core of a state-level electricity dashboard: builds daily
//! consumption series from an immutable table, forecasts future load with an
//! additive trend + seasonality model, flags anomalous days with an isolation
//! forest, and formats forecast reports and per-household cost estimates.

pub mod analysis;
pub mod anomaly;
pub mod config;
pub mod cost;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod report;
pub mod telemetry;
pub mod utils;

pub use analysis::{AnalysisEngine, AnalysisReport, AnalysisRequest};
pub use error::{AnalysisError, Result};
