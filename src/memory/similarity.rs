//! Vector similarity and the recency bonus.

use chrono::{DateTime, Utc};

/// Cosine similarity in `[-1, 1]`.
///
/// Returns 0.0 for mismatched dimensions, empty vectors, or a zero-magnitude
/// side: such pairs are treated as not comparable rather than as an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

/// Exponential recency decay: `max_bonus * 0.5^(age_days / half_life_days)`.
///
/// Bounded by `max_bonus`, strictly decreasing in age, never negative.
/// Future timestamps (clock skew) count as age zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecencyBonus {
    pub max_bonus: f32,
    pub half_life_days: f64,
}

impl Default for RecencyBonus {
    fn default() -> Self {
        Self {
            max_bonus: 0.05,
            half_life_days: 30.0,
        }
    }
}

impl RecencyBonus {
    pub fn score(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
        if self.max_bonus <= 0.0 {
            return 0.0;
        }
        let age_secs = (now - created_at).num_seconds().max(0) as f64;
        let age_days = age_secs / 86_400.0;
        let half_life = self.half_life_days.max(f64::MIN_POSITIVE);
        (self.max_bonus as f64 * 0.5f64.powf(age_days / half_life)) as f32
    }
}
