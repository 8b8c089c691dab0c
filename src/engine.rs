//! # Pipeline Orchestrator
//! Sequences one chat turn: preprocess → emotion + crisis classifiers
//! (concurrent) → historical trend → risk matrix → generation seam → reply
//! safety filter → result bundle.
//!
//! Availability beats sub-model completeness: a missing classifier degrades
//! to its safe fallback (uniform emotion, 0 crisis probability) and the turn
//! still completes. The rule-based crisis scan is never skipped. The profile
//! is updated in a single atomic step only after the full bundle exists.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::classify::{DynCrisisClassifier, DynEmotionClassifier};
use crate::config::RiskConfig;
use crate::crisis::{CrisisDetector, CrisisResult};
use crate::generate::{fallback_reply, ReplyGenerator, TurnContext};
use crate::matrix::{Category, MatrixResult, RiskMatrix};
use crate::preprocess::{anon_hash, preprocess};
use crate::profile::ProfileStore;
use crate::safety::{SafetyDecision, SafetyFilter, CRISIS_ESCALATION_MESSAGE};
use crate::signals::{emotion_risk, EmotionResult};
use crate::trend::{trend_risk, TrendParams};

/// Everything one turn produced, echoed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct TurnBundle {
    pub user_id: String,
    pub preprocessed_text: String,
    pub emotion: EmotionResult,
    pub crisis: CrisisResult,
    pub matrix: MatrixResult,
    pub safety: SafetyDecision,
    pub processing_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

impl TurnBundle {
    /// Safest-possible bundle for an unexpected internal fault: crisis-level
    /// caution with the escalation message, rather than a crashed turn.
    pub fn crisis_caution(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            preprocessed_text: String::new(),
            emotion: EmotionResult::neutral_uniform(),
            crisis: CrisisResult {
                is_crisis: true,
                probability: 1.0,
                matched_keywords: Vec::new(),
                safety_override: true,
            },
            matrix: MatrixResult {
                trs: 1.0,
                mhi: 0.0,
                category: Category::Crisis,
                component_scores: crate::matrix::ComponentScores {
                    emotion_risk: 0.0,
                    crisis_probability: 1.0,
                    screening: 0.0,
                    behavioral: 0.0,
                    historical_trend: 0.0,
                },
            },
            safety: SafetyDecision {
                final_text: CRISIS_ESCALATION_MESSAGE.to_string(),
                flagged: true,
            },
            processing_time_ms: 0.0,
            timestamp: Utc::now(),
        }
    }
}

/// Owns the per-process service objects; constructed once at boot and shared
/// behind an `Arc`. No hidden globals — fakes drop in for every seam.
pub struct RiskEngine {
    detector: CrisisDetector,
    matrix: RiskMatrix,
    filter: SafetyFilter,
    trend: TrendParams,
    emotion_model: DynEmotionClassifier,
    crisis_model: DynCrisisClassifier,
    generator: Arc<dyn ReplyGenerator>,
    profiles: Arc<ProfileStore>,
}

impl RiskEngine {
    pub fn new(
        cfg: &RiskConfig,
        emotion_model: DynEmotionClassifier,
        crisis_model: DynCrisisClassifier,
        generator: Arc<dyn ReplyGenerator>,
        profiles: Arc<ProfileStore>,
    ) -> Self {
        let t = cfg.thresholds;
        Self {
            detector: CrisisDetector::new(t.crisis, t.safety_override),
            matrix: RiskMatrix::new(cfg.weights, cfg.band_table(), t.override_ceiling),
            filter: SafetyFilter::new(t.crisis, t.safety_override),
            trend: cfg.trend,
            emotion_model,
            crisis_model,
            generator,
            profiles,
        }
    }

    pub fn profiles(&self) -> &Arc<ProfileStore> {
        &self.profiles
    }

    /// Process one chat turn end to end. Infallible by contract: every
    /// sub-model failure degrades locally instead of propagating.
    pub async fn process_turn(&self, user_id: &str, message: &str) -> TurnBundle {
        let start = Instant::now();
        let now = Utc::now();

        let cleaned = preprocess(message);
        let msg_id = anon_hash(&cleaned);

        // The two estimators are independent; run them concurrently.
        let (emotion_out, model_prob) = tokio::join!(
            self.emotion_model.classify(&cleaned),
            self.crisis_model.probability(&cleaned)
        );

        let emotion = emotion_out.unwrap_or_else(|| {
            warn!(id = %msg_id, "emotion model unavailable, using neutral fallback");
            EmotionResult::neutral_uniform()
        });
        let model_prob = model_prob.unwrap_or_else(|| {
            warn!(id = %msg_id, "crisis model unavailable, relying on rule scan");
            0.0
        });

        let crisis = self.detector.assess(&cleaned, model_prob);

        let snapshot = self
            .profiles
            .snapshot(user_id, now, self.trend.lookback_days);
        let historical = trend_risk(&snapshot.mhi_window, self.trend.sensitivity);

        let matrix = self.matrix.calculate(
            emotion_risk(&emotion.scores),
            &crisis,
            snapshot.screening_normalized,
            snapshot.behavioral_score,
            historical,
        );

        // Generation seam. On safety override the external call is skipped
        // entirely; the filter substitutes the escalation message anyway.
        let candidate = if crisis.safety_override {
            String::new()
        } else {
            let ctx = TurnContext {
                user_message: message,
                emotion: &emotion,
                crisis: &crisis,
                matrix: &matrix,
            };
            match self.generator.generate(&ctx).await {
                Some(text) => text,
                None => fallback_reply(&emotion, &crisis),
            }
        };

        let safety = self.filter.apply(candidate, crisis.probability);

        self.profiles
            .commit_turn(user_id, matrix.mhi, matrix.category, now);

        let processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            id = %msg_id,
            mhi = matrix.mhi,
            category = matrix.category.as_str(),
            trs = matrix.trs,
            crisis = crisis.is_crisis,
            flagged = safety.flagged,
            elapsed_ms = processing_time_ms,
            "turn complete"
        );

        TurnBundle {
            user_id: user_id.to_string(),
            preprocessed_text: cleaned,
            emotion,
            crisis,
            matrix,
            safety,
            processing_time_ms,
            timestamp: now,
        }
    }
}
