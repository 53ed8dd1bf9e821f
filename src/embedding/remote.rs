//! Remote embedding provider speaking the OpenAI-compatible `/embeddings` API
//! (OpenAI, Ollama, llama.cpp server, vLLM, ...).
//!
//! The HTTP call is async; [`EmbeddingProvider::embed`] drives it on the
//! runtime captured at construction, so it must be called from a blocking
//! context such as `spawn_blocking` (which is how [`super::Embedder`] calls it).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmbedMode, EmbeddingProvider};
use crate::config::EmbeddingConfig;

pub struct RemoteEmbeddingProvider {
    client: reqwest::Client,
    runtime: tokio::runtime::Handle,
    url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    query_prefix: String,
    document_prefix: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl RemoteEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("remote embedding provider requires a tokio runtime")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            runtime,
            url: format!("{}/embeddings", config.endpoint.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            query_prefix: config.query_prefix.clone(),
            document_prefix: config.document_prefix.clone(),
        })
    }

    fn prefixed(&self, text: &str, mode: EmbedMode) -> String {
        match mode {
            EmbedMode::Query => format!("{}{text}", self.query_prefix),
            EmbedMode::Document => format!("{}{text}", self.document_prefix),
        }
    }

    async fn request(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input,
        };
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .with_context(|| format!("embedding request to {} failed", self.url))?;
        anyhow::ensure!(
            response.status().is_success(),
            "embedding API returned HTTP {}",
            response.status()
        );

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .context("invalid embedding API response")?;
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl EmbeddingProvider for RemoteEmbeddingProvider {
    fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        self.embed_batch(&[text], mode)?
            .into_iter()
            .next()
            .context("embedding API returned no vectors")
    }

    fn embed_batch(&self, texts: &[&str], mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let input: Vec<String> = texts.iter().map(|t| self.prefixed(t, mode)).collect();
        let vectors = self.runtime.block_on(self.request(input))?;

        anyhow::ensure!(
            vectors.len() == texts.len(),
            "embedding API returned {} vectors for {} inputs",
            vectors.len(),
            texts.len()
        );
        for v in &vectors {
            anyhow::ensure!(
                v.len() == self.dimensions,
                "embedding API returned {} dims, expected {}",
                v.len(),
                self.dimensions
            );
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
