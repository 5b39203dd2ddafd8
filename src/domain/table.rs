//! Immutable consumption dataset
//!
//! The table is loaded once per session and passed by reference into every
//! pipeline call. Nothing in the crate holds it globally.

use chrono::NaiveDate;
use itertools::Itertools;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use super::types::{ConsumptionRecord, ReportingWindow};
use crate::error::{AnalysisError, Result};

/// Row shape of the upstream CSV before validation
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "Residential_Consumption_kWh")]
    consumption_kwh: f64,
}

/// Read-only handle over all consumption records
#[derive(Debug, Clone, Default)]
pub struct ConsumptionTable {
    records: Vec<ConsumptionRecord>,
}

impl ConsumptionTable {
    /// Build a table from in-memory records, validating each one
    pub fn from_records(records: Vec<ConsumptionRecord>) -> Result<Self> {
        for (idx, record) in records.iter().enumerate() {
            record.validate().map_err(|reason| AnalysisError::Data {
                line: idx as u64 + 1,
                reason,
            })?;
        }
        Ok(Self { records })
    }

    /// Load from a CSV file with `Date,State,Residential_Consumption_kWh` columns
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let table = Self::from_reader(BufReader::new(file))?;
        info!(path = %path.display(), rows = table.len(), "consumption table loaded");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();

        let mut records = Vec::new();
        for row in rdr.records() {
            let row = row?;
            let line = row.position().map(|p| p.line()).unwrap_or_default();
            let data_err = |reason: String| AnalysisError::Data { line, reason };

            let raw: RawRow = row
                .deserialize(Some(&headers))
                .map_err(|e| data_err(e.to_string()))?;
            let date = parse_date(&raw.date)
                .ok_or_else(|| data_err(format!("unparseable date '{}'", raw.date)))?;

            let record = ConsumptionRecord::new(date, raw.state, raw.consumption_kwh);
            record.validate().map_err(data_err)?;
            records.push(record);
        }

        debug!(rows = records.len(), "parsed consumption CSV");
        Ok(Self { records })
    }

    pub fn records(&self) -> &[ConsumptionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct states in order of first appearance
    pub fn states(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.state.as_str()).unique().collect()
    }

    pub fn contains_state(&self, state: &str) -> bool {
        self.records.iter().any(|r| r.state == state)
    }

    /// Every record of a state across the whole history
    pub fn state_records<'a>(
        &'a self,
        state: &'a str,
    ) -> impl Iterator<Item = &'a ConsumptionRecord> + 'a {
        self.records.iter().filter(move |r| r.state == state)
    }

    /// All records inside a reporting window, in table order
    pub fn window_records(&self, window: ReportingWindow) -> Vec<&ConsumptionRecord> {
        self.records
            .iter()
            .filter(|r| window.contains(r.date))
            .collect()
    }

    /// Window records of the selected states, ordered by date
    pub fn compare(&self, window: ReportingWindow, states: &[String]) -> Vec<ConsumptionRecord> {
        self.records
            .iter()
            .filter(|r| window.contains(r.date) && states.iter().any(|s| *s == r.state))
            .sorted_by_key(|r| r.date)
            .cloned()
            .collect()
    }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time component
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        raw.get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
    })
}
