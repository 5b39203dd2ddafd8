use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::path::PathBuf;

use crate::anomaly::IsolationForestConfig;
use crate::cost::{HouseholdConfig, DEFAULT_TARIFF_PER_KWH};
use crate::error::AnalysisError;
use crate::forecast::{AdditiveModelConfig, DuplicatePolicy};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "METER__";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub analysis: AnalysisConfig,
    pub forecast: AdditiveModelConfig,
    pub anomaly: IsolationForestConfig,
    pub households: HouseholdConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub csv_path: PathBuf,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("india_residential_smart_meter_2025_Jan_Jun.csv"),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

/// One dashboard run: which month, which states, which tariff/threshold
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub year: i32,
    pub month: u32,
    /// Empty selects the first state present in the month
    pub states: Vec<String>,
    pub tariff_per_kwh: f64,
    pub threshold_kwh: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            year: 2025,
            month: 1,
            states: Vec::new(),
            tariff_per_kwh: DEFAULT_TARIFF_PER_KWH,
            threshold_kwh: 400.0,
        }
    }
}

impl Config {
    /// `config/default.toml` overlaid with `METER__SECTION__KEY` variables
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file(DEFAULT_CONFIG_PATH))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self> {
        let cfg: Config = Self::figment().extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> std::result::Result<(), AnalysisError> {
        if !(1..=12).contains(&self.analysis.month) {
            return Err(AnalysisError::Config(format!(
                "analysis.month must be between 1 and 12, got {}",
                self.analysis.month
            )));
        }
        if !self.analysis.tariff_per_kwh.is_finite() || self.analysis.tariff_per_kwh < 0.0 {
            return Err(AnalysisError::Config(
                "analysis.tariff_per_kwh must be a non-negative number".to_string(),
            ));
        }
        if !self.analysis.threshold_kwh.is_finite() {
            return Err(AnalysisError::Config(
                "analysis.threshold_kwh must be finite".to_string(),
            ));
        }
        self.forecast.validate()?;
        self.anomaly.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let cfg: Config = Config::figment().extract()?;
            assert_eq!(cfg.analysis.year, 2025);
            assert_eq!(cfg.forecast.horizon_days, 184);
            assert_eq!(cfg.anomaly.contamination, 0.03);
            assert_eq!(cfg.anomaly.seed, 42);
            assert!(cfg.households.use_builtin_estimates);
            assert!(cfg.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_file_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                DEFAULT_CONFIG_PATH,
                r#"
                [analysis]
                month = 3
                states = ["Bihar"]

                [forecast]
                horizon_days = 30

                [households.counts]
                Goa = 350000
                "#,
            )?;
            jail.set_env("METER__ANALYSIS__MONTH", "4");
            jail.set_env("METER__DATA__DUPLICATE_POLICY", "reject");

            let cfg: Config = Config::figment().extract()?;
            assert_eq!(cfg.analysis.month, 4);
            assert_eq!(cfg.analysis.states, vec!["Bihar".to_string()]);
            assert_eq!(cfg.forecast.horizon_days, 30);
            assert_eq!(cfg.forecast.n_changepoints, 25);
            assert_eq!(cfg.households.counts.get("Goa"), Some(&350_000));
            assert_eq!(cfg.data.duplicate_policy, DuplicatePolicy::Reject);
            Ok(())
        });
    }

    #[test]
    fn test_validation_rejects_bad_month() {
        let cfg = Config {
            analysis: AnalysisConfig {
                month: 13,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(AnalysisError::Config(_))));
    }
}
