//! Deterministic feature-hashing embeddings.
//!
//! Each lowercase word and each character trigram of the word is hashed into
//! one of `dimensions` buckets with a hash-derived sign, then the vector is
//! L2-normalized. Texts sharing words or word fragments end up with positive
//! cosine similarity; the output depends only on the input text, so it is
//! usable offline and across restarts.

use anyhow::Result;

use super::{l2_normalize, EmbedMode, EmbeddingProvider};

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

pub struct HashingEmbeddingProvider {
    dimensions: usize,
    model_id: String,
}

impl HashingEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model_id: format!("hashing-{dimensions}"),
        }
    }

    /// Infallible embedding; query and document modes are identical here.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
        {
            self.add_feature(&mut v, word.as_bytes(), WORD_WEIGHT);

            let padded: Vec<char> = format!("#{word}#").chars().collect();
            for window in padded.windows(3) {
                let gram: String = window.iter().collect();
                self.add_feature(&mut v, gram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        l2_normalize(&v)
    }

    fn add_feature(&self, v: &mut [f32], feature: &[u8], weight: f32) {
        let h = fnv1a_64(feature);
        let bucket = (h % self.dimensions as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

impl EmbeddingProvider for HashingEmbeddingProvider {
    fn embed(&self, text: &str, _mode: EmbedMode) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ *b as u64).wrapping_mul(PRIME))
}
