//! Local ONNX Runtime embedding provider.
//!
//! Runs a sentence-transformer export (nomic-embed-text by default) via `ort`.
//! Handles tokenization, inference, mean pooling, and L2 normalization.

use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{l2_normalize, EmbedMode, EmbeddingProvider};
use crate::config::EmbeddingConfig;

const MAX_SEQ_LEN: usize = 512;

pub struct OnnxEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    model: String,
    dimensions: usize,
    query_prefix: String,
    document_prefix: String,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex.
unsafe impl Send for OnnxEmbeddingProvider {}
unsafe impl Sync for OnnxEmbeddingProvider {}

impl OnnxEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let cache_dir = crate::config::expand_tilde(&config.cache_dir);
        let model_path = cache_dir.join("model.onnx");
        let tokenizer_path = cache_dir.join("tokenizer.json");

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `recollect model download` first.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `recollect model download` first.",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        tracing::info!(model = %model_path.display(), "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model: config.model.clone(),
            dimensions: config.dimensions,
            query_prefix: config.query_prefix.clone(),
            document_prefix: config.document_prefix.clone(),
        })
    }
}

impl EmbeddingProvider for OnnxEmbeddingProvider {
    fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        self.embed_batch(&[text], mode)?
            .into_iter()
            .next()
            .context("empty embedding batch")
    }

    fn embed_batch(&self, texts: &[&str], mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let prefix = match mode {
            EmbedMode::Query => &self.query_prefix,
            EmbedMode::Document => &self.document_prefix,
        };
        let inputs: Vec<String> = texts.iter().map(|t| format!("{prefix}{t}")).collect();

        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        let mut input_ids_flat = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask_flat = Vec::with_capacity(batch_size * seq_len);
        for encoding in &encodings {
            input_ids_flat.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask_flat.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let input_ids_tensor =
            Tensor::from_array((shape.clone(), input_ids_flat.into_boxed_slice()))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask_flat.clone().into_boxed_slice()))?;
        // single segment
        let token_type_ids_tensor =
            Tensor::from_array((shape, vec![0i64; batch_size * seq_len].into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
            "token_type_ids" => token_type_ids_tensor,
        })?;

        // Output name varies by export.
        let token_emb_value = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (shape, data) = token_emb_value
            .try_extract_tensor::<f32>()
            .context("failed to extract token_embeddings tensor")?;

        let dims: &[i64] = &shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[2] == self.dimensions as i64,
            "unexpected token_embeddings shape: {dims:?}, expected [batch, seq, {}]",
            self.dimensions
        );
        let hidden_dim = dims[2] as usize;
        let actual_seq_len = dims[1] as usize;

        let mut results = Vec::with_capacity(batch_size);
        for b in 0..batch_size {
            let mut sum = vec![0.0f32; hidden_dim];
            let mut count = 0.0f32;

            for s in 0..actual_seq_len {
                let mask = attention_mask_flat[b * seq_len + s] as f32;
                if mask > 0.0 {
                    let offset = (b * actual_seq_len + s) * hidden_dim;
                    for (d, acc) in sum.iter_mut().enumerate() {
                        *acc += data[offset + d] * mask;
                    }
                    count += mask;
                }
            }

            if count > 0.0 {
                sum.iter_mut().for_each(|x| *x /= count);
            }
            results.push(l2_normalize(&sum));
        }

        Ok(results)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::similarity::cosine_similarity;

    fn test_config() -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "onnx".into(),
            ..EmbeddingConfig::default()
        }
    }

    #[test]
    fn missing_model_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmbeddingConfig {
            cache_dir: dir.path().to_string_lossy().into_owned(),
            ..test_config()
        };
        let err = OnnxEmbeddingProvider::new(&config).err().unwrap();
        assert!(err.to_string().contains("recollect model download"));
    }

    #[test]
    #[ignore] // Requires model files: run with `cargo test -- --ignored`
    fn test_embed_dimensions_and_norm() {
        let provider = OnnxEmbeddingProvider::new(&test_config()).unwrap();
        let embedding = provider.embed("Hello world", EmbedMode::Document).unwrap();
        assert_eq!(embedding.len(), test_config().dimensions);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "L2 norm should be ~1.0, got {norm}");
    }

    #[test]
    #[ignore]
    fn test_query_finds_paraphrase() {
        let provider = OnnxEmbeddingProvider::new(&test_config()).unwrap();
        let doc = provider
            .embed("I parked the car in lot B5", EmbedMode::Document)
            .unwrap();
        let other = provider
            .embed("The wifi password is hunter2", EmbedMode::Document)
            .unwrap();
        let query = provider
            .embed("where is my vehicle", EmbedMode::Query)
            .unwrap();
        assert!(cosine_similarity(&doc, &query) > cosine_similarity(&other, &query));
    }

    #[test]
    #[ignore]
    fn test_empty_batch() {
        let provider = OnnxEmbeddingProvider::new(&test_config()).unwrap();
        assert!(provider.embed_batch(&[], EmbedMode::Query).unwrap().is_empty());
    }
}
