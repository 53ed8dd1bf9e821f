//! Save and recall: the embedding pipeline in front of the store, and the
//! semantic → keyword → recent fallback chain.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use super::keywords::extract_keywords;
use super::search::{rank, score, search_similar, SearchParams};
use super::store::{keyword_hits, MemoryStore};
use super::types::{MemoryRecord, ScoredMemory};
use crate::clock::Clock;
use crate::embedding::{EmbedMode, Embedder};

/// Which stage of the fallback chain produced the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallStrategy {
    Semantic,
    Keyword,
    /// The query had no usable keywords; every memory is returned newest first.
    RecentFallback,
    Nothing,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecallResponse {
    pub strategy: RecallStrategy,
    pub results: Vec<ScoredMemory>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub embedded: usize,
    pub failed: usize,
}

pub struct MemoryService {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<Embedder>,
    params: SearchParams,
    clock: Arc<dyn Clock>,
}

impl MemoryService {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<Embedder>,
        params: SearchParams,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            embedder,
            params,
            clock,
        }
    }

    /// Save a fact. The record is stored even when only the fallback
    /// embedding was available; backfill upgrades it later.
    pub async fn remember(&self, owner_id: &str, text: &str) -> Result<MemoryRecord> {
        let content = normalize(text);
        anyhow::ensure!(!content.is_empty(), "nothing to remember");

        let embedded = self.embedder.embed(&content, EmbedMode::Document).await;
        if embedded.degraded {
            tracing::warn!(owner_id, "memory saved with fallback embedding");
        }

        let record = MemoryRecord::new(owner_id, &content, self.clock.now())
            .with_embedding(embedded.vector, &embedded.model);
        self.store.save(&record)?;

        tracing::info!(id = %record.id, owner_id, model = ?record.embedding_model, "memory saved");
        Ok(record)
    }

    pub async fn recall(&self, owner_id: &str, query: &str) -> Result<RecallResponse> {
        let now = self.clock.now();
        let embedded = self.embedder.embed(query, EmbedMode::Query).await;

        let candidates: Vec<MemoryRecord> = self
            .store
            .get_by_owner(owner_id)?
            .into_iter()
            .filter(|r| r.embedding_model.as_deref() == Some(embedded.model.as_str()))
            .collect();

        let results = search_similar(&embedded.vector, &candidates, &self.params, now);
        if !results.is_empty() {
            tracing::debug!(owner_id, hits = results.len(), "semantic recall");
            return Ok(RecallResponse {
                strategy: RecallStrategy::Semantic,
                results,
            });
        }

        let keywords = extract_keywords(query);
        let mut hits = self.store.keyword_search(owner_id, query)?;
        if !hits.is_empty() {
            hits.truncate(self.params.top_k);
            let results = hits
                .iter()
                .map(|r| {
                    let matched = keyword_hits(&r.content, &keywords);
                    let similarity = matched as f32 / keywords.len().max(1) as f32;
                    score(r, similarity, &self.params.recency, now)
                })
                .collect();
            tracing::debug!(owner_id, hits = hits.len(), "keyword recall");
            return Ok(RecallResponse {
                strategy: RecallStrategy::Keyword,
                results,
            });
        }

        if keywords.is_empty() {
            let mut results: Vec<ScoredMemory> = self
                .store
                .get_by_owner(owner_id)?
                .iter()
                .map(|r| score(r, 0.0, &self.params.recency, now))
                .collect();
            if !results.is_empty() {
                rank(&mut results);
                tracing::debug!(owner_id, count = results.len(), "recent fallback recall");
                return Ok(RecallResponse {
                    strategy: RecallStrategy::RecentFallback,
                    results,
                });
            }
        }

        Ok(RecallResponse {
            strategy: RecallStrategy::Nothing,
            results: vec![],
        })
    }

    pub fn forget(&self, id: &str) -> Result<bool> {
        let deleted = self.store.delete(id)?;
        tracing::info!(id, deleted, "forget memory");
        Ok(deleted)
    }

    pub fn forget_all(&self, owner_id: &str) -> Result<usize> {
        let deleted = self.store.delete_all_for_owner(owner_id)?;
        tracing::info!(owner_id, deleted, "forget all memories");
        Ok(deleted)
    }

    /// Embed records that have no vector, and re-embed records tagged with
    /// any model other than the primary (the fallback, or a previously
    /// configured provider), using the primary provider only. Records the
    /// primary still cannot embed are left untouched and counted as failed.
    pub async fn backfill_embeddings(&self, owner_id: &str) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();
        let primary = self.embedder.primary_model().to_string();

        let pending: Vec<MemoryRecord> = self
            .store
            .get_by_owner(owner_id)?
            .into_iter()
            .filter(|r| r.embedding.is_none() || r.embedding_model.as_deref() != Some(primary.as_str()))
            .collect();

        for record in pending {
            match self
                .embedder
                .try_primary(&record.content, EmbedMode::Document)
                .await
            {
                Ok(vector) => {
                    if self.store.set_embedding(&record.id, &vector, &primary)? {
                        report.embedded += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "backfill embedding failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(owner_id, embedded = report.embedded, failed = report.failed, "backfill complete");
        Ok(report)
    }
}

/// Collapse runs of whitespace and trim.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  I parked\n in   lot B5 "), "I parked in lot B5");
    }
}
