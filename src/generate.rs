//! Reply generation seam. The backend is a pluggable black box returning
//! text; the pipeline never depends on how the text was produced. When the
//! backend is disabled or fails, a canned supportive reply keyed to the
//! detected emotion stands in so a turn always has a response.

use async_trait::async_trait;

use crate::crisis::CrisisResult;
use crate::matrix::MatrixResult;
use crate::safety::CRISIS_ESCALATION_MESSAGE;
use crate::signals::{Emotion, EmotionResult};

/// Everything a backend may condition the reply on.
pub struct TurnContext<'a> {
    pub user_message: &'a str,
    pub emotion: &'a EmotionResult,
    pub crisis: &'a CrisisResult,
    pub matrix: &'a MatrixResult,
}

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Produce a candidate reply, or `None` when the backend is unavailable.
    async fn generate(&self, ctx: &TurnContext<'_>) -> Option<String>;
    fn name(&self) -> &'static str;
}

/// Returns `None` always; the orchestrator falls back to `fallback_reply`.
pub struct DisabledGenerator;

#[async_trait]
impl ReplyGenerator for DisabledGenerator {
    async fn generate(&self, _ctx: &TurnContext<'_>) -> Option<String> {
        None
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Fixed-output backend for tests.
#[derive(Clone)]
pub struct MockGenerator {
    pub fixed: String,
}

#[async_trait]
impl ReplyGenerator for MockGenerator {
    async fn generate(&self, _ctx: &TurnContext<'_>) -> Option<String> {
        Some(self.fixed.clone())
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Safe canned response when the generator seam yields nothing.
/// Crisis-flagged turns get the escalation message outright.
pub fn fallback_reply(emotion: &EmotionResult, crisis: &CrisisResult) -> String {
    if crisis.is_crisis {
        return CRISIS_ESCALATION_MESSAGE.to_string();
    }
    let feeling = match emotion.label {
        Emotion::Neutral | Emotion::Surprise => "a lot".to_string(),
        label => format!("some {}", label.as_str()),
    };
    format!(
        "Thank you for sharing. I'm here to listen and support you. It sounds like you might \
         be feeling {feeling}. Remember, it's okay to feel this way, and reaching out is a sign \
         of strength. Would you like to try a grounding exercise or talk more about what's on \
         your mind?"
    )
}
