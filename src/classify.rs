//! Classifier adapters: the emotion and crisis model seams.
//!
//! Both models are external collaborators reached over HTTP; the pipeline
//! only sees the trait objects. Every failure path returns `None` and the
//! orchestrator substitutes the safe fallback (uniform emotion, 0 crisis
//! probability) — the rule-based crisis scan remains the recall floor.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::signals::{Emotion, EmotionResult};

/// Binary crisis classifier: P(crisis) for preprocessed text.
pub trait CrisisClassifier: Send + Sync {
    fn probability<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<f64>> + Send + 'a>>;
    /// Provider name for diagnostics/headers.
    fn name(&self) -> &'static str;
}

/// Emotion classifier: full label distribution for preprocessed text.
pub trait EmotionClassifier: Send + Sync {
    fn classify<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<EmotionResult>> + Send + 'a>>;
    fn name(&self) -> &'static str;
}

pub type DynCrisisClassifier = Arc<dyn CrisisClassifier>;
pub type DynEmotionClassifier = Arc<dyn EmotionClassifier>;

/// Returns `None` always; used when model inference is disabled.
pub struct DisabledClassifier;

impl CrisisClassifier for DisabledClassifier {
    fn probability<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<f64>> + Send + 'a>> {
        Box::pin(async { None })
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

impl EmotionClassifier for DisabledClassifier {
    fn classify<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<EmotionResult>> + Send + 'a>> {
        Box::pin(async { None })
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic mocks for tests/local runs (`RISK_TEST_MODE=mock`).
#[derive(Clone)]
pub struct MockCrisisClassifier {
    pub fixed: f64,
}

impl CrisisClassifier for MockCrisisClassifier {
    fn probability<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<f64>> + Send + 'a>> {
        let p = self.fixed;
        Box::pin(async move { Some(p) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

#[derive(Clone)]
pub struct MockEmotionClassifier {
    pub fixed: EmotionResult,
}

impl EmotionClassifier for MockEmotionClassifier {
    fn classify<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<EmotionResult>> + Send + 'a>> {
        let out = self.fixed.clone();
        Box::pin(async move { Some(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Remote inference client for a model-serving sidecar exposing
/// `POST {base}/emotion` and `POST {base}/crisis` with JSON bodies.
pub struct HttpInference {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct InferReq<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct CrisisResp {
    probability: f64,
}

#[derive(Deserialize)]
struct EmotionResp {
    scores: BTreeMap<Emotion, f64>,
}

impl HttpInference {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!(
                "wellbeing-risk-analyzer/",
                env!("CARGO_PKG_VERSION")
            ))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post_json<T: serde::de::DeserializeOwned>(&self, route: &str, text: &str) -> Option<T> {
        let resp = self
            .http
            .post(format!("{}/{route}", self.base_url))
            .json(&InferReq { text })
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.json::<T>().await.ok()
    }
}

impl CrisisClassifier for HttpInference {
    fn probability<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<f64>> + Send + 'a>> {
        Box::pin(async move {
            let body: CrisisResp = self.post_json("crisis", text).await?;
            if body.probability.is_finite() {
                Some(body.probability.clamp(0.0, 1.0))
            } else {
                None
            }
        })
    }
    fn name(&self) -> &'static str {
        "http"
    }
}

impl EmotionClassifier for HttpInference {
    fn classify<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<EmotionResult>> + Send + 'a>> {
        Box::pin(async move {
            let body: EmotionResp = self.post_json("emotion", text).await?;
            if body.scores.is_empty() {
                return None;
            }
            Some(EmotionResult::from_scores(body.scores))
        })
    }
    fn name(&self) -> &'static str {
        "http"
    }
}

/// Factory: build both classifier handles according to config and environment.
///
/// * If `RISK_TEST_MODE=mock`, returns deterministic mock clients.
/// * Else if inference is disabled or no endpoint is configured, returns
///   disabled clients (the pipeline degrades to rule-only crisis detection
///   and the neutral emotion fallback).
/// * Else builds the shared HTTP client for both models.
pub fn build_classifiers(cfg: &ModelConfig) -> (DynEmotionClassifier, DynCrisisClassifier) {
    if std::env::var("RISK_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        let emotion = MockEmotionClassifier {
            fixed: EmotionResult::neutral_uniform(),
        };
        let crisis = MockCrisisClassifier { fixed: 0.0 };
        return (Arc::new(emotion), Arc::new(crisis));
    }

    if !cfg.enabled || cfg.endpoint.trim().is_empty() {
        return (Arc::new(DisabledClassifier), Arc::new(DisabledClassifier));
    }

    let client = Arc::new(HttpInference::new(
        &cfg.endpoint,
        Duration::from_secs(cfg.timeout_secs),
    ));
    let emotion: DynEmotionClassifier = client.clone();
    let crisis: DynCrisisClassifier = client;
    (emotion, crisis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_classifier_returns_none() {
        let c = DisabledClassifier;
        assert!(CrisisClassifier::probability(&c, "anything").await.is_none());
        assert!(EmotionClassifier::classify(&c, "anything").await.is_none());
    }

    #[tokio::test]
    async fn mock_classifiers_are_deterministic() {
        let crisis = MockCrisisClassifier { fixed: 0.42 };
        assert_eq!(crisis.probability("x").await, Some(0.42));

        let emotion = MockEmotionClassifier {
            fixed: EmotionResult::neutral_uniform(),
        };
        let out = emotion.classify("x").await.unwrap();
        assert_eq!(out.label, Emotion::Neutral);
    }
}
