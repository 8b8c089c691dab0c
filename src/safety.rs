//! Reply safety filter: the last gate between generated text and the user.
//!
//! Strict priority order per reply:
//! 1. hard override (crisis probability ≥ override threshold) — discard the
//!    candidate entirely, substitute the fixed escalation message; terminal.
//! 2. soft reinforcement (≥ crisis threshold) — keep the text, append the
//!    professional-support recommendation, then fall through to the scan.
//! 3. content scan — blocklist of harmful patterns; on any match discard and
//!    substitute the safe redirect, flag the turn.
//! 4. pass through unchanged.
//!
//! Probability-based overrides always win over content-based filtering: the
//! blocklist is necessarily incomplete, so it is the secondary net.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fixed escalation message substituted on hard override. Must be returned
/// verbatim — downstream layers may not edit it.
pub const CRISIS_ESCALATION_MESSAGE: &str = "I'm really concerned about what you've shared. \
You're not alone, and help is available right now.\n\n\
National Suicide Prevention Lifeline: 988 (US)\n\
Crisis Text Line: Text HOME to 741741\n\
International Association for Suicide Prevention: https://www.iasp.info/resources/Crisis_Centres/\n\n\
Please reach out to a professional. Your life matters.";

/// Appended to the reply in the soft-crisis band.
pub const SUPPORT_RECOMMENDATION: &str = "\n\nIt might also help to talk this through with a \
mental health professional. If things feel heavier, the 988 lifeline is available any time.";

/// Substituted when the content scan trips on the candidate text.
pub const SAFE_REDIRECT_MESSAGE: &str = "I want to make sure I'm supporting you in a helpful \
way. It's important to talk to a qualified mental health professional who can provide \
personalized guidance. Would you like me to share some resources?";

/// Phrases that must never appear in a reply shown to the user.
static BLOCKED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"you should (kill|hurt|harm) yourself",
        r"(commit|attempt) suicide",
        r"here('s| is) how to (end|take) your life",
        r"(instructions|steps) (to|for) (self[- ]?harm|suicide|overdose)",
        r"you('re| are) (hopeless|worthless|better off dead)",
        r"nobody (cares|will miss you)",
        r"prescription|prescribe|medication dosage",
        r"diagnos(e|is|ing) you with",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).expect("valid blocklist pattern"))
    .collect()
});

/// Filter verdict. Ownership of the candidate text transfers to the filter,
/// which may discard and replace it. `flagged` means the candidate was
/// discarded (override or blocklist hit); soft reinforcement only appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyDecision {
    pub final_text: String,
    pub flagged: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SafetyFilter {
    t_crisis: f64,
    t_override: f64,
}

impl SafetyFilter {
    pub fn new(t_crisis: f64, t_override: f64) -> Self {
        Self {
            t_crisis,
            t_override,
        }
    }

    pub fn apply(&self, candidate: String, crisis_probability: f64) -> SafetyDecision {
        // Tier 1: hard override. Terminal; no further checks.
        if crisis_probability >= self.t_override {
            metrics::counter!("reply_filter_hard_override_total").increment(1);
            return SafetyDecision {
                final_text: CRISIS_ESCALATION_MESSAGE.to_string(),
                flagged: true,
            };
        }

        // Tier 2: soft reinforcement, then fall through to the scan.
        let mut text = candidate;
        if crisis_probability >= self.t_crisis {
            text.push_str(SUPPORT_RECOMMENDATION);
        }

        // Tier 3: content scan.
        if let Some(pattern) = scan(&text) {
            warn!(%pattern, "reply blocked by safety filter");
            metrics::counter!("reply_filter_flagged_total").increment(1);
            return SafetyDecision {
                final_text: SAFE_REDIRECT_MESSAGE.to_string(),
                flagged: true,
            };
        }

        SafetyDecision {
            final_text: text,
            flagged: false,
        }
    }
}

/// First matching blocklist pattern, if any.
fn scan(text: &str) -> Option<&'static str> {
    BLOCKED_PATTERNS
        .iter()
        .find(|re| re.is_match(text))
        .map(|re| re.as_str())
}
