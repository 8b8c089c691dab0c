//! Input normalization applied before any estimator sees the text:
//! lowercase, strip URLs and emails, collapse whitespace, expand the common
//! contractions the crisis patterns rely on ("don't" → "do not").

use once_cell::sync::Lazy;
use regex::Regex;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("url regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email regex"));

const CONTRACTIONS: &[(&str, &str)] = &[
    ("i'm", "i am"),
    ("i've", "i have"),
    ("i'll", "i will"),
    ("i'd", "i would"),
    ("can't", "cannot"),
    ("won't", "will not"),
    ("don't", "do not"),
    ("doesn't", "does not"),
    ("didn't", "did not"),
    ("isn't", "is not"),
    ("aren't", "are not"),
    ("wasn't", "was not"),
    ("weren't", "were not"),
    ("couldn't", "could not"),
    ("wouldn't", "would not"),
    ("shouldn't", "should not"),
    ("haven't", "have not"),
    ("hasn't", "has not"),
    ("hadn't", "had not"),
    ("it's", "it is"),
    ("that's", "that is"),
    ("there's", "there is"),
    ("they're", "they are"),
    ("we're", "we are"),
    ("you're", "you are"),
    ("let's", "let us"),
    ("what's", "what is"),
];

/// Clean and normalize user input for the classifier/rule layers.
pub fn preprocess(text: &str) -> String {
    let lowered = text.to_lowercase();
    let no_urls = URL_RE.replace_all(&lowered, "");
    let no_emails = EMAIL_RE.replace_all(&no_urls, "");

    let mut out = collapse_whitespace(&no_emails);
    for (contraction, expansion) in CONTRACTIONS {
        if out.contains(contraction) {
            out = out.replace(contraction, expansion);
        }
    }
    out
}

fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !out.is_empty() {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out.trim_end().to_string()
}

/// Short anonymized id for log lines. Raw user text must never be logged;
/// the hash prefix is enough to correlate events for one message.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_collapses_whitespace() {
        assert_eq!(preprocess("  I  FEEL\t\tSO   tired "), "i feel so tired");
    }

    #[test]
    fn strips_urls_and_emails() {
        assert_eq!(
            preprocess("read https://example.com/post then email me@site.org ok"),
            "read then ok"
        );
        assert_eq!(preprocess("see www.example.com now"), "see now");
    }

    #[test]
    fn expands_contractions() {
        assert_eq!(
            preprocess("I don't think I can't cope, it's too much"),
            "i do not think i cannot cope, it is too much"
        );
    }

    #[test]
    fn anon_hash_is_stable_and_short() {
        let a = anon_hash("some message");
        let b = anon_hash("some message");
        let c = anon_hash("another message");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
