use anyhow::Result;
use residential_meter_analyzer::{config, telemetry, AnalysisEngine, AnalysisRequest};
use residential_meter_analyzer::domain::ConsumptionTable;
use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load()?;
    let table = ConsumptionTable::from_path(&cfg.data.csv_path)?;
    let engine = AnalysisEngine::from_config(&cfg)?;
    let request = AnalysisRequest::from_config(&cfg.analysis)?;

    info!(window = %request.window, states = ?request.states, "running analysis");
    let report = engine.run(&table, &request)?;

    for warning in &report.warnings {
        warn!(%warning, "analysis warning");
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
