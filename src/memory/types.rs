//! Memory record and ranked-result types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A saved fact. Only the embedding is ever updated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub id: String,
    pub owner_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub embedding: Option<Vec<f32>>,
    /// Model that produced `embedding`. Vectors from different models are not comparable.
    pub embedding_model: Option<String>,
}

impl MemoryRecord {
    /// New record with a UUID v7 id.
    pub fn new(owner_id: &str, content: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            owner_id: owner_id.to_string(),
            content: content.to_string(),
            created_at,
            embedding: None,
            embedding_model: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>, model: &str) -> Self {
        self.embedding = Some(embedding);
        self.embedding_model = Some(model.to_string());
        self
    }
}

/// A memory with its score against a query. Derived, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMemory {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub similarity: f32,
    pub recency_bonus: f32,
    /// `similarity + recency_bonus`; the ranking key.
    pub final_score: f32,
}
