//! Risk matrix: fuse the five normalized signals into a Total Risk Score,
//! derive the Mental Health Index, classify into a category band, and apply
//! the safety-override clamp.
//!
//! The override is the single highest-priority rule in the whole pipeline:
//! when the crisis signal carries `safety_override`, the category is forced
//! to `Crisis` and the MHI is capped, regardless of the computed value.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::crisis::CrisisResult;
use crate::signals::{round2, round4};

/// Ordered category bands. High MHI = healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Normal,
    MildStress,
    Anxiety,
    DepressionRisk,
    Crisis,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Normal => "normal",
            Category::MildStress => "mild_stress",
            Category::Anxiety => "anxiety",
            Category::DepressionRisk => "depression_risk",
            Category::Crisis => "crisis",
        }
    }
}

/// Five matrix weights. The loader must see them sum to 1.0 — a vector that
/// does not is rejected outright, never silently renormalized.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Weights {
    pub emotion: f64,
    pub crisis: f64,
    pub screening: f64,
    pub behavioral: f64,
    pub history: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            emotion: 0.30,
            crisis: 0.25,
            screening: 0.20,
            behavioral: 0.10,
            history: 0.15,
        }
    }
}

impl Weights {
    pub const SUM_TOLERANCE: f64 = 1e-6;

    pub fn validate(&self) -> Result<()> {
        let all = [
            ("emotion", self.emotion),
            ("crisis", self.crisis),
            ("screening", self.screening),
            ("behavioral", self.behavioral),
            ("history", self.history),
        ];
        for (name, w) in all {
            if !w.is_finite() || w < 0.0 {
                bail!("matrix weight `{name}` must be a non-negative finite number, got {w}");
            }
        }
        let sum: f64 = all.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > Self::SUM_TOLERANCE {
            bail!("matrix weights must sum to 1.0, got {sum}");
        }
        Ok(())
    }
}

/// One MHI band: half-open `[low, high)`; the top band is closed at 100.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Band {
    pub category: Category,
    pub low: f64,
    pub high: f64,
}

/// Validated band table tiling [0,100] with no gaps or overlaps.
#[derive(Debug, Clone)]
pub struct BandTable {
    bands: Vec<Band>,
}

impl BandTable {
    pub const MHI_MAX: f64 = 100.0;

    /// Build from raw bands, enforcing the tiling invariant: sorted coverage
    /// starting at 0, ending at 100, with exact boundary adjacency. Fractional
    /// gaps between bands (e.g. 79.99 / 80.0 tables) are a rejected config.
    pub fn new(mut bands: Vec<Band>) -> Result<Self> {
        if bands.is_empty() {
            bail!("band table must not be empty");
        }
        bands.sort_by(|a, b| a.low.total_cmp(&b.low));

        for b in &bands {
            if !(b.low.is_finite() && b.high.is_finite()) || b.low >= b.high {
                bail!(
                    "band `{}` has invalid bounds [{}, {})",
                    b.category.as_str(),
                    b.low,
                    b.high
                );
            }
        }
        if bands[0].low != 0.0 {
            bail!("band table must start at 0, got {}", bands[0].low);
        }
        if bands[bands.len() - 1].high != Self::MHI_MAX {
            bail!(
                "band table must end at {}, got {}",
                Self::MHI_MAX,
                bands[bands.len() - 1].high
            );
        }
        for pair in bands.windows(2) {
            if pair[0].high != pair[1].low {
                bail!(
                    "band boundary mismatch: `{}` ends at {} but `{}` starts at {}",
                    pair[0].category.as_str(),
                    pair[0].high,
                    pair[1].category.as_str(),
                    pair[1].low
                );
            }
        }
        Ok(Self { bands })
    }

    /// The canonical five-band table.
    pub fn standard() -> Self {
        Self::new(vec![
            Band {
                category: Category::Crisis,
                low: 0.0,
                high: 20.0,
            },
            Band {
                category: Category::DepressionRisk,
                low: 20.0,
                high: 40.0,
            },
            Band {
                category: Category::Anxiety,
                low: 40.0,
                high: 60.0,
            },
            Band {
                category: Category::MildStress,
                low: 60.0,
                high: 80.0,
            },
            Band {
                category: Category::Normal,
                low: 80.0,
                high: 100.0,
            },
        ])
        .expect("standard band table is valid")
    }

    /// Map an MHI value to its category. Inputs outside [0,100] are clamped;
    /// exactly 100 belongs to the top band.
    pub fn lookup(&self, mhi: f64) -> Category {
        let mhi = mhi.clamp(0.0, Self::MHI_MAX);
        for b in &self.bands {
            if mhi >= b.low && mhi < b.high {
                return b.category;
            }
        }
        // Only reachable for mhi == 100.0 (top band is closed at the max).
        self.bands[self.bands.len() - 1].category
    }
}

/// Component inputs echoed verbatim into the result for explainability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub emotion_risk: f64,
    pub crisis_probability: f64,
    pub screening: f64,
    pub behavioral: f64,
    pub historical_trend: f64,
}

/// Matrix output: TRS in [0,1], MHI in [0,100], category, component echo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixResult {
    pub trs: f64,
    pub mhi: f64,
    pub category: Category,
    pub component_scores: ComponentScores,
}

/// Calculator holding the validated weights, band table and override ceiling.
#[derive(Debug, Clone)]
pub struct RiskMatrix {
    weights: Weights,
    bands: BandTable,
    override_ceiling: f64,
}

impl RiskMatrix {
    pub fn new(weights: Weights, bands: BandTable, override_ceiling: f64) -> Self {
        Self {
            weights,
            bands,
            override_ceiling,
        }
    }

    /// TRS → MHI → category, then the override clamp.
    pub fn calculate(
        &self,
        emotion_risk: f64,
        crisis: &CrisisResult,
        screening: f64,
        behavioral: f64,
        historical_trend: f64,
    ) -> MatrixResult {
        let components = ComponentScores {
            emotion_risk: emotion_risk.clamp(0.0, 1.0),
            crisis_probability: crisis.probability.clamp(0.0, 1.0),
            screening: screening.clamp(0.0, 1.0),
            behavioral: behavioral.clamp(0.0, 1.0),
            historical_trend: historical_trend.clamp(0.0, 1.0),
        };

        let w = &self.weights;
        let trs = round4(
            (w.emotion * components.emotion_risk
                + w.crisis * components.crisis_probability
                + w.screening * components.screening
                + w.behavioral * components.behavioral
                + w.history * components.historical_trend)
                .clamp(0.0, 1.0),
        );

        let mut mhi = round2(BandTable::MHI_MAX * (1.0 - trs));
        let mut category = self.bands.lookup(mhi);

        if crisis.safety_override {
            category = Category::Crisis;
            mhi = mhi.min(self.override_ceiling);
            warn!(mhi, "matrix safety override: category forced to crisis");
        }

        MatrixResult {
            trs,
            mhi,
            category,
            component_scores: components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_crisis(probability: f64) -> CrisisResult {
        CrisisResult {
            is_crisis: false,
            probability,
            matched_keywords: Vec::new(),
            safety_override: false,
        }
    }

    fn override_crisis(probability: f64) -> CrisisResult {
        CrisisResult {
            is_crisis: true,
            probability,
            matched_keywords: Vec::new(),
            safety_override: true,
        }
    }

    fn matrix(weights: Weights) -> RiskMatrix {
        RiskMatrix::new(weights, BandTable::standard(), 15.0)
    }

    #[test]
    fn worked_example_from_calibration_notes() {
        // weights {E:0.3, C:0.35, S:0.15, B:0.1, H:0.1},
        // E=0.8 C=0.9 S=0.5 B=0 H=0 → trs 0.63 → mhi 37.0 → depression_risk
        let m = matrix(Weights {
            emotion: 0.30,
            crisis: 0.35,
            screening: 0.15,
            behavioral: 0.10,
            history: 0.10,
        });
        let r = m.calculate(0.8, &quiet_crisis(0.9), 0.5, 0.0, 0.0);
        assert!((r.trs - 0.63).abs() < 1e-9, "trs {}", r.trs);
        assert!((r.mhi - 37.0).abs() < 1e-9, "mhi {}", r.mhi);
        assert_eq!(r.category, Category::DepressionRisk);

        // Same inputs but the override flag set: category and ceiling win.
        let r = m.calculate(0.8, &override_crisis(0.9), 0.5, 0.0, 0.0);
        assert_eq!(r.category, Category::Crisis);
        assert!(r.mhi <= 15.0);
        assert!((r.trs - 0.63).abs() < 1e-9, "trs is not clamped, only mhi");
    }

    #[test]
    fn mhi_complements_trs_before_any_clamp() {
        let m = matrix(Weights::default());
        let r = m.calculate(1.0, &quiet_crisis(1.0), 1.0, 1.0, 1.0);
        assert_eq!(r.trs, 1.0);
        assert_eq!(r.mhi, 0.0);
        assert_eq!(r.category, Category::Crisis);

        let r = m.calculate(0.0, &quiet_crisis(0.0), 0.0, 0.0, 0.0);
        assert_eq!(r.trs, 0.0);
        assert_eq!(r.mhi, 100.0);
        assert_eq!(r.category, Category::Normal);
    }

    #[test]
    fn band_boundaries_are_exact() {
        let bands = BandTable::standard();
        assert_eq!(bands.lookup(79.99), Category::MildStress);
        assert_eq!(bands.lookup(80.0), Category::Normal);
        assert_eq!(bands.lookup(100.0), Category::Normal);
        assert_eq!(bands.lookup(0.0), Category::Crisis);
        assert_eq!(bands.lookup(19.999), Category::Crisis);
        assert_eq!(bands.lookup(20.0), Category::DepressionRisk);
    }

    #[test]
    fn band_table_rejects_gaps_and_overlaps() {
        // The classic 79.99 table: a 0.01-wide hole between every band.
        let gappy = BandTable::new(vec![
            Band {
                category: Category::Crisis,
                low: 0.0,
                high: 19.99,
            },
            Band {
                category: Category::Normal,
                low: 20.0,
                high: 100.0,
            },
        ]);
        assert!(gappy.is_err());

        let overlapping = BandTable::new(vec![
            Band {
                category: Category::Crisis,
                low: 0.0,
                high: 25.0,
            },
            Band {
                category: Category::Normal,
                low: 20.0,
                high: 100.0,
            },
        ]);
        assert!(overlapping.is_err());

        let short = BandTable::new(vec![Band {
            category: Category::Crisis,
            low: 0.0,
            high: 90.0,
        }]);
        assert!(short.is_err());
    }

    #[test]
    fn weights_must_sum_to_one() {
        assert!(Weights::default().validate().is_ok());

        let bad = Weights {
            emotion: 0.5,
            crisis: 0.5,
            screening: 0.5,
            behavioral: 0.0,
            history: 0.0,
        };
        assert!(bad.validate().is_err());

        let negative = Weights {
            emotion: -0.1,
            crisis: 0.6,
            screening: 0.2,
            behavioral: 0.2,
            history: 0.1,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn component_scores_are_echoed_verbatim() {
        let m = matrix(Weights::default());
        let r = m.calculate(0.4, &quiet_crisis(0.3), 0.2, 0.1, 0.05);
        assert_eq!(r.component_scores.emotion_risk, 0.4);
        assert_eq!(r.component_scores.crisis_probability, 0.3);
        assert_eq!(r.component_scores.screening, 0.2);
        assert_eq!(r.component_scores.behavioral, 0.1);
        assert_eq!(r.component_scores.historical_trend, 0.05);
    }
}
