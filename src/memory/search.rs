use chrono::{DateTime, Utc};

use super::similarity::{cosine_similarity, RecencyBonus};
use super::types::{MemoryRecord, ScoredMemory};
use crate::config::RetrievalConfig;

/// Search knobs.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub top_k: usize,
    /// Applied to raw similarity, not to the final score.
    pub similarity_threshold: f32,
    pub recency: RecencyBonus,
}

impl From<&RetrievalConfig> for SearchParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            similarity_threshold: config.similarity_threshold,
            recency: RecencyBonus {
                max_bonus: config.recency_max_bonus,
                half_life_days: config.recency_half_life_days as f64,
            },
        }
    }
}

/// Rank `candidates` against `query`.
///
/// Candidates without an embedding are skipped. Results are ordered by
/// `final_score` descending, then `created_at` descending, then `id`
/// ascending, and never exceed `top_k`. Pure and deterministic.
pub fn search_similar(
    query: &[f32],
    candidates: &[MemoryRecord],
    params: &SearchParams,
    now: DateTime<Utc>,
) -> Vec<ScoredMemory> {
    let mut scored: Vec<ScoredMemory> = candidates
        .iter()
        .filter_map(|record| {
            let embedding = record.embedding.as_deref().filter(|e| !e.is_empty())?;
            let similarity = cosine_similarity(query, embedding);
            if similarity < params.similarity_threshold {
                return None;
            }
            Some(score(record, similarity, &params.recency, now))
        })
        .collect();

    rank(&mut scored);
    scored.truncate(params.top_k);
    scored
}

/// Build a [`ScoredMemory`] for a record with a known similarity.
pub fn score(
    record: &MemoryRecord,
    similarity: f32,
    recency: &RecencyBonus,
    now: DateTime<Utc>,
) -> ScoredMemory {
    let recency_bonus = recency.score(record.created_at, now);
    ScoredMemory {
        id: record.id.clone(),
        content: record.content.clone(),
        created_at: record.created_at,
        similarity,
        recency_bonus,
        final_score: similarity + recency_bonus,
    }
}

/// Sort in ranking order.
pub fn rank(results: &mut [ScoredMemory]) {
    results.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}
