//! In-memory user profile store.
//!
//! Profiles are created lazily on first contact with healthy defaults
//! (MHI 100, category normal) and mutated in exactly two places: the
//! whole-turn commit after a bundle is fully computed, and assessment
//! submission. All access goes through one lock, so a commit is atomic and
//! overlapping turns for the same user resolve last-write-wins.
//!
//! This store is the seam a database adapter would implement; the scoring
//! core needs only `snapshot` / `commit_turn` / `record_assessment`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::matrix::Category;

const HISTORY_CAP: usize = 500;

/// One stored MHI reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MhiSample {
    pub mhi: f64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub total_sessions: u64,
    pub latest_mhi: f64,
    pub latest_category: Category,
    pub phq2: Option<u8>,
    pub gad2: Option<u8>,
    pub screening_normalized: f64,
    pub behavioral_score: f64,
    pub mhi_history: Vec<MhiSample>,
}

impl UserProfile {
    /// A brand-new user starts at the healthiest classification, not an
    /// arbitrary default.
    fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            created_at: now,
            last_active: now,
            total_sessions: 0,
            latest_mhi: 100.0,
            latest_category: Category::Normal,
            phq2: None,
            gad2: None,
            screening_normalized: 0.0,
            behavioral_score: 0.0,
            mhi_history: Vec::new(),
        }
    }
}

/// Consistent read the matrix stage works from: prior screening/behavioral
/// values plus the MHI window for the trend estimator (oldest first).
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSnapshot {
    pub screening_normalized: f64,
    pub behavioral_score: f64,
    pub mhi_window: Vec<f64>,
}

#[derive(Debug, Default)]
pub struct ProfileStore {
    inner: Mutex<HashMap<String, UserProfile>>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the inputs one turn needs, creating the profile if absent.
    pub fn snapshot(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        lookback_days: u32,
    ) -> ProfileSnapshot {
        let mut map = self.inner.lock().expect("profile store mutex poisoned");
        let profile = map
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(user_id, now));

        let cutoff = now - Duration::days(i64::from(lookback_days));
        let mhi_window = profile
            .mhi_history
            .iter()
            .filter(|s| s.at >= cutoff)
            .map(|s| s.mhi)
            .collect();

        ProfileSnapshot {
            screening_normalized: profile.screening_normalized,
            behavioral_score: profile.behavioral_score,
            mhi_window,
        }
    }

    /// Single atomic post-turn update: latest scores, session count, history.
    /// Called only after the full bundle is computed, never mid-pipeline.
    pub fn commit_turn(&self, user_id: &str, mhi: f64, category: Category, now: DateTime<Utc>) {
        let mut map = self.inner.lock().expect("profile store mutex poisoned");
        let profile = map
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(user_id, now));

        profile.last_active = now;
        profile.latest_mhi = mhi;
        profile.latest_category = category;
        profile.total_sessions += 1;
        profile.mhi_history.push(MhiSample { mhi, at: now });
        if profile.mhi_history.len() > HISTORY_CAP {
            let excess = profile.mhi_history.len() - HISTORY_CAP;
            profile.mhi_history.drain(0..excess);
        }
    }

    /// Explicit assessment submission; held constant across chat turns otherwise.
    pub fn record_assessment(
        &self,
        user_id: &str,
        phq2: Option<u8>,
        gad2: Option<u8>,
        screening_normalized: f64,
        now: DateTime<Utc>,
    ) {
        let mut map = self.inner.lock().expect("profile store mutex poisoned");
        let profile = map
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(user_id, now));
        profile.phq2 = phq2;
        profile.gad2 = gad2;
        profile.screening_normalized = screening_normalized;
        profile.last_active = now;
    }

    /// Behavioral signal is supplied by an external collaborator.
    pub fn set_behavioral_score(&self, user_id: &str, score: f64, now: DateTime<Utc>) {
        let mut map = self.inner.lock().expect("profile store mutex poisoned");
        let profile = map
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(user_id, now));
        profile.behavioral_score = score.clamp(0.0, 1.0);
    }

    /// Clone-out for the debug endpoints.
    pub fn get(&self, user_id: &str) -> Option<UserProfile> {
        let map = self.inner.lock().expect("profile store mutex poisoned");
        map.get(user_id).cloned()
    }
}
