//! Signal normalization: emotion distribution → bounded risk contribution,
//! PHQ-2/GAD-2 self-report sub-scores → screening score in [0,1].
//!
//! Pure functions, no side effects. Missing sub-scores are treated as 0.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closed emotion vocabulary emitted by the emotion classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Neutral,
    Joy,
    Sadness,
    Anger,
    Fear,
    Stress,
    Anxiety,
    Disgust,
    Surprise,
}

impl Emotion {
    pub const ALL: [Emotion; 9] = [
        Emotion::Neutral,
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Stress,
        Emotion::Anxiety,
        Emotion::Disgust,
        Emotion::Surprise,
    ];

    /// Labels that contribute to the risk aggregate. Everything else
    /// (neutral, joy, surprise) contributes nothing.
    pub const NEGATIVE: [Emotion; 6] = [
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Stress,
        Emotion::Anxiety,
        Emotion::Disgust,
    ];

    pub fn is_negative(self) -> bool {
        Self::NEGATIVE.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Stress => "stress",
            Emotion::Anxiety => "anxiety",
            Emotion::Disgust => "disgust",
            Emotion::Surprise => "surprise",
        }
    }
}

/// Emotion classifier output: full per-label confidence plus the dominant label.
/// Probabilities are independent per-label confidences and need not sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionResult {
    pub label: Emotion,
    pub scores: BTreeMap<Emotion, f64>,
    pub confidence: f64,
}

impl EmotionResult {
    /// Build from a raw distribution; dominant label = argmax.
    /// An empty distribution degrades to the neutral fallback.
    pub fn from_scores(scores: BTreeMap<Emotion, f64>) -> Self {
        let mut best: Option<(Emotion, f64)> = None;
        for (&label, &p) in &scores {
            let p = p.clamp(0.0, 1.0);
            match best {
                Some((_, bp)) if p <= bp => {}
                _ => best = Some((label, p)),
            }
        }
        match best {
            Some((label, confidence)) => Self {
                label,
                scores,
                confidence,
            },
            None => Self::neutral_uniform(),
        }
    }

    /// Deterministic fallback used when the emotion model is unavailable:
    /// uniform mass over the whole vocabulary, neutral dominant label.
    pub fn neutral_uniform() -> Self {
        let p = round4(1.0 / Emotion::ALL.len() as f64);
        let scores: BTreeMap<Emotion, f64> = Emotion::ALL.iter().map(|&e| (e, p)).collect();
        Self {
            label: Emotion::Neutral,
            scores,
            confidence: p,
        }
    }
}

/// Maximum total per PHQ-2 / GAD-2 questionnaire (two items, each 0–3).
pub const SCREENING_SUBSCORE_MAX: u8 = 6;

/// Sum the probability mass assigned to negative labels, clamped to [0,1].
pub fn emotion_risk(scores: &BTreeMap<Emotion, f64>) -> f64 {
    let risk: f64 = scores
        .iter()
        .filter(|(label, _)| label.is_negative())
        .map(|(_, p)| p)
        .sum();
    round4(risk.clamp(0.0, 1.0))
}

/// Normalize combined PHQ-2 (0–6) + GAD-2 (0–6) into [0,1]. Max combined = 12.
/// Absent sub-scores count as 0; out-of-range values are capped at the maximum.
pub fn screening_risk(phq2: Option<u8>, gad2: Option<u8>) -> f64 {
    let a = phq2.unwrap_or(0).min(SCREENING_SUBSCORE_MAX);
    let b = gad2.unwrap_or(0).min(SCREENING_SUBSCORE_MAX);
    round4(f64::from(a + b) / f64::from(2 * SCREENING_SUBSCORE_MAX))
}

pub(crate) fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(pairs: &[(Emotion, f64)]) -> BTreeMap<Emotion, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn negative_labels_only_drive_risk() {
        let scores = dist(&[
            (Emotion::Joy, 0.9),
            (Emotion::Neutral, 0.8),
            (Emotion::Surprise, 0.7),
            (Emotion::Sadness, 0.2),
            (Emotion::Fear, 0.1),
        ]);
        let r = emotion_risk(&scores);
        assert!((r - 0.3).abs() < 1e-9, "got {r}");
    }

    #[test]
    fn risk_is_clamped_to_unit_interval() {
        let scores = dist(&[
            (Emotion::Sadness, 0.9),
            (Emotion::Anger, 0.9),
            (Emotion::Fear, 0.9),
        ]);
        assert_eq!(emotion_risk(&scores), 1.0);
        assert_eq!(emotion_risk(&BTreeMap::new()), 0.0);
    }

    #[test]
    fn screening_matches_worked_example() {
        // phq2=4, gad2=3 → (4+3)/12 = 0.5833
        assert!((screening_risk(Some(4), Some(3)) - 0.5833).abs() < 1e-9);
    }

    #[test]
    fn screening_tolerates_missing_and_oversized_inputs() {
        assert_eq!(screening_risk(None, None), 0.0);
        assert_eq!(screening_risk(Some(4), None), round4(4.0 / 12.0));
        // Out-of-range sub-scores cap at 6 instead of breaking the bound.
        assert_eq!(screening_risk(Some(200), Some(200)), 1.0);
    }

    #[test]
    fn dominant_label_is_argmax() {
        let r = EmotionResult::from_scores(dist(&[
            (Emotion::Sadness, 0.61),
            (Emotion::Neutral, 0.22),
            (Emotion::Fear, 0.17),
        ]));
        assert_eq!(r.label, Emotion::Sadness);
        assert!((r.confidence - 0.61).abs() < 1e-9);
    }

    #[test]
    fn empty_distribution_degrades_to_neutral() {
        let r = EmotionResult::from_scores(BTreeMap::new());
        assert_eq!(r.label, Emotion::Neutral);
        assert_eq!(r.scores.len(), Emotion::ALL.len());
    }

    #[test]
    fn labels_serialize_snake_case() {
        assert_eq!(
            serde_json::to_value(Emotion::Sadness).unwrap(),
            serde_json::json!("sadness")
        );
        let r = EmotionResult::neutral_uniform();
        let v = serde_json::to_value(&r).unwrap();
        assert!(v["scores"]["neutral"].is_number());
    }
}
