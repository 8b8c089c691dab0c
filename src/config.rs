//! Risk pipeline configuration: TOML file + env overrides, validated at load.
//!
//! Every value that gates safety behavior lives here. Validation failures are
//! fatal by design — the service must refuse to serve rather than run with a
//! weight vector or threshold pair that was never sanity-checked.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::matrix::{Band, BandTable, Weights};
use crate::trend::TrendParams;

pub const DEFAULT_RISK_CONFIG_PATH: &str = "config/risk.toml";

pub const ENV_RISK_CONFIG_PATH: &str = "RISK_CONFIG_PATH";
pub const ENV_CRISIS_THRESHOLD: &str = "RISK_CRISIS_THRESHOLD";
pub const ENV_OVERRIDE_THRESHOLD: &str = "RISK_OVERRIDE_THRESHOLD";

fn default_override_ceiling() -> f64 {
    15.0
}

fn default_timeout_secs() -> u64 {
    10
}

/// Crisis/override probability thresholds plus the MHI cap applied on override.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Thresholds {
    pub crisis: f64,
    pub safety_override: f64,
    #[serde(default = "default_override_ceiling")]
    pub override_ceiling: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            crisis: 0.65,
            safety_override: 0.80,
            override_ceiling: default_override_ceiling(),
        }
    }
}

/// Remote model inference endpoint (emotion + crisis classifiers).
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    pub weights: Weights,
    pub thresholds: Thresholds,
    #[serde(default)]
    pub trend: TrendParams,
    pub bands: Vec<Band>,
    #[serde(default)]
    pub models: ModelConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            thresholds: Thresholds::default(),
            trend: TrendParams::default(),
            bands: standard_bands(),
            models: ModelConfig::default(),
        }
    }
}

fn standard_bands() -> Vec<Band> {
    use crate::matrix::Category::*;
    [
        (Crisis, 0.0, 20.0),
        (DepressionRisk, 20.0, 40.0),
        (Anxiety, 40.0, 60.0),
        (MildStress, 60.0, 80.0),
        (Normal, 80.0, 100.0),
    ]
    .into_iter()
    .map(|(category, low, high)| Band {
        category,
        low,
        high,
    })
    .collect()
}

impl RiskConfig {
    /// Load from `RISK_CONFIG_PATH` (default `config/risk.toml`), apply env
    /// threshold overrides, validate. Any failure is fatal for the caller.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_RISK_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_RISK_CONFIG_PATH));

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read risk config at {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&content)?;

        if let Some(t) = parse_unit_env(std::env::var(ENV_CRISIS_THRESHOLD).ok()) {
            cfg.thresholds.crisis = t;
        }
        if let Some(t) = parse_unit_env(std::env::var(ENV_OVERRIDE_THRESHOLD).ok()) {
            cfg.thresholds.safety_override = t;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse and validate from a TOML string (public for tests/tools).
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let cfg: RiskConfig = toml::from_str(toml_str).context("invalid risk config TOML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;

        let t = &self.thresholds;
        for (name, v) in [("crisis", t.crisis), ("safety_override", t.safety_override)] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                bail!("threshold `{name}` must be in [0,1], got {v}");
            }
        }
        if t.safety_override <= t.crisis {
            bail!(
                "safety_override threshold ({}) must be strictly greater than crisis threshold ({})",
                t.safety_override,
                t.crisis
            );
        }
        if !t.override_ceiling.is_finite() || !(0.0..=100.0).contains(&t.override_ceiling) {
            bail!(
                "override_ceiling must be in [0,100], got {}",
                t.override_ceiling
            );
        }

        if self.trend.lookback_days == 0 {
            bail!("trend lookback_days must be at least 1");
        }
        if !self.trend.sensitivity.is_finite() || self.trend.sensitivity <= 0.0 {
            bail!(
                "trend sensitivity must be a positive number, got {}",
                self.trend.sensitivity
            );
        }

        // Band tiling is checked by constructing the table.
        BandTable::new(self.bands.clone())?;
        Ok(())
    }

    /// Validated band table for the matrix calculator.
    pub fn band_table(&self) -> BandTable {
        BandTable::new(self.bands.clone()).expect("bands validated at load")
    }
}

// parse optional float env and clamp to <0.0..=1.0>
fn parse_unit_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .map(|v| v.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[weights]
emotion = 0.30
crisis = 0.25
screening = 0.20
behavioral = 0.10
history = 0.15

[thresholds]
crisis = 0.65
safety_override = 0.80
override_ceiling = 15.0

[trend]
lookback_days = 14
sensitivity = 5.0

[models]
enabled = false
endpoint = ""

[[bands]]
category = "crisis"
low = 0.0
high = 20.0

[[bands]]
category = "depression_risk"
low = 20.0
high = 40.0

[[bands]]
category = "anxiety"
low = 40.0
high = 60.0

[[bands]]
category = "mild_stress"
low = 60.0
high = 80.0

[[bands]]
category = "normal"
low = 80.0
high = 100.0
"#;

    #[test]
    fn valid_config_parses() {
        let cfg = RiskConfig::from_toml_str(VALID).unwrap();
        assert!((cfg.weights.crisis - 0.25).abs() < 1e-9);
        assert_eq!(cfg.trend.lookback_days, 14);
        assert!(!cfg.models.enabled);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(RiskConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let bad = VALID.replace("emotion = 0.30", "emotion = 0.40");
        assert!(RiskConfig::from_toml_str(&bad).is_err());
    }

    #[test]
    fn rejects_override_not_above_crisis() {
        let equal = VALID.replace("safety_override = 0.80", "safety_override = 0.65");
        assert!(RiskConfig::from_toml_str(&equal).is_err());

        let inverted = VALID.replace("safety_override = 0.80", "safety_override = 0.50");
        assert!(RiskConfig::from_toml_str(&inverted).is_err());
    }

    #[test]
    fn rejects_band_gaps() {
        let gappy = VALID.replace("high = 20.0", "high = 19.99");
        assert!(RiskConfig::from_toml_str(&gappy).is_err());
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let bad = VALID.replace("crisis = 0.65", "crisis = 1.65");
        assert!(RiskConfig::from_toml_str(&bad).is_err());
    }

    #[test]
    fn rejects_degenerate_trend_params() {
        let bad = VALID.replace("sensitivity = 5.0", "sensitivity = 0.0");
        assert!(RiskConfig::from_toml_str(&bad).is_err());

        let bad = VALID.replace("lookback_days = 14", "lookback_days = 0");
        assert!(RiskConfig::from_toml_str(&bad).is_err());
    }
}
