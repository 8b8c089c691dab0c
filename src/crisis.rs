//! Crisis detection: weighted pattern scan fused with a classifier probability.
//!
//! Two independent estimators are combined by `max()` — recall-favoring on
//! purpose. A false negative here is the unacceptable failure mode, so the
//! fusion must never be softened to an average. The rule scan has no model
//! artifacts to load and therefore can never be skipped; the model estimator
//! fails open to 0 when unavailable.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::preprocess::anon_hash;
use crate::signals::round4;

/// One entry of the rule table: a compiled pattern with a fixed severity weight.
struct CrisisPattern {
    name: &'static str,
    re: Regex,
    weight: f64,
}

/// Severity-ordered pattern table. Weights are the rule estimator's output
/// scale: the scan returns the maximum weight among matches.
static CRISIS_PATTERNS: Lazy<Vec<CrisisPattern>> = Lazy::new(|| {
    let table: &[(&str, &str, f64)] = &[
        // Explicit suicidal intent
        ("kill myself", r"kill(ing)? myself", 0.95),
        ("end my life", r"end(ing)? my( own)? life", 0.95),
        ("suicide", r"suicid(e|al)", 0.95),
        ("hang myself", r"hang(ing)? myself", 0.95),
        ("jump off", r"jump(ing)? off", 0.90),
        ("overdose", r"overdos(e|ing)", 0.90),
        // Passive ideation
        ("want to die", r"want(ed)? to die", 0.90),
        ("no reason to live", r"no reason to (live|go on)", 0.90),
        ("not worth living", r"not worth living", 0.90),
        ("do not want to be alive", r"do not want to (be alive|exist)", 0.90),
        ("better off dead", r"better off dead", 0.85),
        ("end it all", r"end it all", 0.80),
        // Self-harm
        ("self harm", r"self[- ]?harm", 0.85),
        ("cutting myself", r"cut(ting)? myself", 0.85),
        ("hurting myself", r"hurt(ing)? myself", 0.85),
    ];
    table
        .iter()
        .map(|&(name, pattern, weight)| CrisisPattern {
            name,
            re: Regex::new(pattern).expect("valid crisis pattern"),
            weight,
        })
        .collect()
});

/// Rule estimator output: max severity among matches + the matched names.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleScan {
    pub score: f64,
    pub matched: Vec<String>,
}

/// Scan normalized input text against the pattern table.
/// Returns 0.0 and no matches when nothing fires.
pub fn rule_scan(text: &str) -> RuleScan {
    let mut score: f64 = 0.0;
    let mut matched = Vec::new();
    for p in CRISIS_PATTERNS.iter() {
        if p.re.is_match(text) {
            score = score.max(p.weight);
            matched.push(p.name.to_string());
        }
    }
    RuleScan { score, matched }
}

/// Fused crisis assessment for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisResult {
    pub is_crisis: bool,
    pub probability: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_keywords: Vec<String>,
    pub safety_override: bool,
}

impl CrisisResult {
    /// A quiet result (no signal from either estimator).
    pub fn none() -> Self {
        Self {
            is_crisis: false,
            probability: 0.0,
            matched_keywords: Vec::new(),
            safety_override: false,
        }
    }
}

/// State-free per call; holds only the two calibrated thresholds
/// (`safety_override > crisis` is enforced by the config loader).
#[derive(Debug, Clone, Copy)]
pub struct CrisisDetector {
    t_crisis: f64,
    t_override: f64,
}

impl CrisisDetector {
    pub fn new(t_crisis: f64, t_override: f64) -> Self {
        Self {
            t_crisis,
            t_override,
        }
    }

    /// Fuse the rule scan with the model probability (already resolved by the
    /// caller; 0.0 when the model is unavailable) and derive the tiered flags.
    pub fn assess(&self, text: &str, model_probability: f64) -> CrisisResult {
        let rule = rule_scan(text);
        let combined = rule.score.max(model_probability.clamp(0.0, 1.0));

        let is_crisis = combined >= self.t_crisis;
        let safety_override = combined >= self.t_override;

        if safety_override {
            // Audit trail only; control flow happens downstream in the matrix
            // and the reply filter. Raw text is never logged.
            warn!(
                id = %anon_hash(text),
                probability = combined,
                matched = rule.matched.len(),
                "safety override triggered"
            );
            metrics::counter!("crisis_safety_override_total").increment(1);
        }

        CrisisResult {
            is_crisis,
            probability: round4(combined),
            matched_keywords: rule.matched,
            safety_override,
        }
    }
}
