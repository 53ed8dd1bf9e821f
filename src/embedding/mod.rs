//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait, three implementations (remote
//! HTTP, local ONNX, deterministic feature hashing), and the [`Embedder`]
//! that wraps a primary provider with a timeout and a hashing fallback so an
//! unreachable provider degrades recall instead of failing it.

pub mod hashing;
pub mod onnx;
pub mod remote;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use hashing::HashingEmbeddingProvider;

/// Whether the text being embedded is a search query or stored content.
/// Some models are trained with different prompts for each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    Query,
    Document,
}

/// Trait for embedding text into vectors.
///
/// All methods are synchronous; callers in async contexts should go through
/// [`Embedder`], which runs them on the blocking pool.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str], mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t, mode)).collect()
    }

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Identifier stored next to every vector this provider produces.
    fn model_id(&self) -> &str;
}

/// Create the configured primary embedding provider.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hashing" => Ok(Box::new(HashingEmbeddingProvider::new(config.dimensions))),
        "onnx" => Ok(Box::new(onnx::OnnxEmbeddingProvider::new(config)?)),
        "remote" => Ok(Box::new(remote::RemoteEmbeddingProvider::new(config)?)),
        other => {
            anyhow::bail!("unknown embedding provider: {other}. Supported: hashing, onnx, remote")
        }
    }
}

/// A vector plus the model that produced it.
#[derive(Debug, Clone)]
pub struct Embedded {
    pub vector: Vec<f32>,
    pub model: String,
    /// `true` when the primary provider failed and the hashing fallback was used.
    pub degraded: bool,
}

/// Primary provider guarded by a timeout, with the hashing provider behind it.
pub struct Embedder {
    primary: Arc<dyn EmbeddingProvider>,
    fallback: Arc<HashingEmbeddingProvider>,
    timeout: Duration,
}

impl Embedder {
    pub fn new(primary: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        let fallback = Arc::new(HashingEmbeddingProvider::new(primary.dimensions()));
        Self {
            primary,
            fallback,
            timeout,
        }
    }

    /// Build from config. A primary provider that cannot be constructed (missing
    /// model files, no runtime) is replaced by the hashing provider.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let primary: Arc<dyn EmbeddingProvider> = match create_provider(config) {
            Ok(provider) => Arc::from(provider),
            Err(e) => {
                tracing::warn!(
                    provider = %config.provider,
                    error = %e,
                    "embedding provider unavailable, using hashing embeddings"
                );
                Arc::new(HashingEmbeddingProvider::new(config.dimensions))
            }
        };
        tracing::info!(model = %primary.model_id(), dims = primary.dimensions(), "embedding provider ready");
        Self::new(primary, Duration::from_millis(config.timeout_ms))
    }

    pub fn primary_model(&self) -> &str {
        self.primary.model_id()
    }

    pub fn fallback_model(&self) -> &str {
        self.fallback.model_id()
    }

    pub fn dimensions(&self) -> usize {
        self.primary.dimensions()
    }

    /// Embed with the primary provider, degrading to the hashing fallback on
    /// error, timeout, or a wrong-sized vector. Never fails.
    pub async fn embed(&self, text: &str, mode: EmbedMode) -> Embedded {
        match self.try_primary(text, mode).await {
            Ok(vector) => Embedded {
                vector,
                model: self.primary.model_id().to_string(),
                degraded: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, "primary embedding failed, using fallback");
                let degraded = self.primary.model_id() != self.fallback.model_id();
                Embedded {
                    vector: self.fallback.embed_text(text),
                    model: self.fallback.model_id().to_string(),
                    degraded,
                }
            }
        }
    }

    /// Embed with the primary provider only, bounded by the configured timeout.
    pub async fn try_primary(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        let provider = Arc::clone(&self.primary);
        let owned = text.to_string();
        let task = tokio::task::spawn_blocking(move || provider.embed(&owned, mode));

        let vector = match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => joined??,
            Err(_) => anyhow::bail!("embedding timed out after {:?}", self.timeout),
        };

        anyhow::ensure!(
            vector.len() == self.primary.dimensions(),
            "provider returned {} dims, expected {}",
            vector.len(),
            self.primary.dimensions()
        );
        Ok(vector)
    }
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;

    impl EmbeddingProvider for FailingProvider {
        fn embed(&self, _text: &str, _mode: EmbedMode) -> Result<Vec<f32>> {
            anyhow::bail!("connection refused")
        }
        fn dimensions(&self) -> usize {
            16
        }
        fn model_id(&self) -> &str {
            "remote-test"
        }
    }

    struct SlowProvider;

    impl EmbeddingProvider for SlowProvider {
        fn embed(&self, _text: &str, _mode: EmbedMode) -> Result<Vec<f32>> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(vec![1.0; 16])
        }
        fn dimensions(&self) -> usize {
            16
        }
        fn model_id(&self) -> &str {
            "slow-test"
        }
    }

    #[test]
    fn test_l2_normalize() {
        let normalized = l2_normalize(&[3.0, 4.0]);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        assert_eq!(l2_normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = EmbeddingConfig {
            provider: "magic".into(),
            ..EmbeddingConfig::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("unknown embedding provider"));
    }

    #[tokio::test]
    async fn failing_primary_degrades_to_hashing() {
        let embedder = Embedder::new(Arc::new(FailingProvider), Duration::from_secs(1));
        let out = embedder.embed("where is my car", EmbedMode::Query).await;
        assert!(out.degraded);
        assert_eq!(out.model, embedder.fallback_model());
        assert_eq!(out.vector.len(), 16);
    }

    #[tokio::test]
    async fn slow_primary_times_out_to_fallback() {
        let embedder = Embedder::new(Arc::new(SlowProvider), Duration::from_millis(20));
        let out = embedder.embed("parked in lot B5", EmbedMode::Document).await;
        assert!(out.degraded);
        assert_eq!(out.model, "hashing-16");
    }

    #[tokio::test]
    async fn hashing_primary_is_not_degraded() {
        let embedder = Embedder::new(
            Arc::new(HashingEmbeddingProvider::new(32)),
            Duration::from_secs(1),
        );
        let out = embedder.embed("keys in the drawer", EmbedMode::Document).await;
        assert!(!out.degraded);
        assert_eq!(out.vector.len(), 32);
    }
}
