//! Historical trend: OLS slope of recent MHI readings → [0,1] deterioration score.
//!
//! Index convention: index 0 = oldest reading. A worsening trajectory
//! (declining MHI) therefore yields a negative slope, which maps to positive
//! risk. Fewer than 2 readings means no discernible trend (exactly 0).

use serde::Deserialize;

use crate::signals::round4;

fn default_lookback_days() -> u32 {
    14
}

fn default_sensitivity() -> f64 {
    5.0
}

/// Calibration knobs for the trend estimator. Both are empirical tuning
/// values, kept configurable rather than hard-wired.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TrendParams {
    /// Look-back window over stored MHI readings, in days.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Slope units of MHI-per-reading that map to full risk (1.0).
    /// Larger = less sensitive.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            sensitivity: default_sensitivity(),
        }
    }
}

/// Ordinary least-squares slope of `values` against their sequence index.
/// Returns 0.0 for degenerate inputs (fewer than 2 points).
pub fn ols_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Deterioration score in [0,1] for a chronologically ordered MHI window
/// (oldest first). 0 = improving/stable, approaching 1 = consistently worsening.
pub fn trend_risk(values: &[f64], sensitivity: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let slope = ols_slope(values);
    round4((-slope / sensitivity).clamp(0.0, 1.0))
}

/// Coarse direction label for the profile trend read-out.
pub fn trend_direction(values: &[f64]) -> &'static str {
    if values.len() < 2 {
        return "stable";
    }
    let slope = ols_slope(values);
    if slope > 0.5 {
        "improving"
    } else if slope < -0.5 {
        "declining"
    } else {
        "stable"
    }
}
