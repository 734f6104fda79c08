//! Embedding service and similarity functions.
//!
//! The [`Embedder`] wraps an [`EmbeddingBackend`] with input validation and
//! error wrapping. Three backends are provided: a deterministic hashing
//! backend for tests and offline development, a local transformer model, and
//! an OpenAI-compatible HTTP endpoint.

use std::sync::Arc;

use ragdb_core::config::Config;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::EmbeddingBackend;
use ragdb_core::types::EmbeddingVector;

pub mod hash;
pub mod local;
pub mod remote;

pub use hash::HashingBackend;
pub use local::LocalBackend;
pub use remote::{RemoteBackend, RemoteEmbeddingConfig};

/// Maps text to fixed-dimension dense vectors via the configured backend.
///
/// Batch embedding is all-or-nothing: a backend failure yields no partial
/// results, and the single wrapped error carries the original cause.
#[derive(Clone)]
pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
}

impl Embedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self { backend }
    }

    /// Dimensionality of every vector this embedder produces.
    pub fn dim(&self) -> usize {
        self.backend.dim()
    }

    /// Embed a single text. Fails with `EmptyInput` on blank input.
    pub async fn embed_one(&self, text: &str) -> Result<EmbeddingVector> {
        if text.trim().is_empty() {
            return Err(Error::EmptyInput("text cannot be empty".to_string()));
        }
        let mut vectors = self
            .backend
            .embed(&[text.to_string()])
            .await
            .map_err(Error::EmbeddingBackend)?;
        if vectors.is_empty() {
            return Err(Error::EmbeddingBackend(anyhow::anyhow!(
                "backend returned no vector"
            )));
        }
        Ok(vectors.remove(0))
    }

    /// Embed a batch. Blank entries are dropped; the output is aligned
    /// index-for-index with the filtered view (no placeholders are
    /// reinserted). Fails with `EmptyInput` when nothing survives the
    /// filter.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Err(Error::EmptyInput("texts cannot be empty".to_string()));
        }
        let valid: Vec<String> = texts
            .iter()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect();
        if valid.is_empty() {
            return Err(Error::EmptyInput(
                "no non-empty texts provided".to_string(),
            ));
        }
        tracing::debug!(count = valid.len(), "embedding batch");
        self.backend
            .embed(&valid)
            .await
            .map_err(Error::EmbeddingBackend)
    }
}

/// Cosine similarity in `[-1, 1]`. Returns 0.0 (not an error) when either
/// vector has zero magnitude, keeping the function total.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / denom)
}

/// One score per candidate, in candidate order.
pub fn cosine_similarity_batch(query: &[f32], candidates: &[EmbeddingVector]) -> Result<Vec<f32>> {
    candidates
        .iter()
        .map(|c| cosine_similarity(query, c))
        .collect()
}

/// Resolve the embedding backend from configuration.
///
/// `RAGDB_USE_HASH_EMBEDDINGS=1` forces the hashing backend regardless of
/// config, for fast and deterministic behavior in tests and development.
pub fn default_backend(config: &Config) -> anyhow::Result<Arc<dyn EmbeddingBackend>> {
    let use_hash = std::env::var("RAGDB_USE_HASH_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_hash {
        tracing::info!("using hashing embedding backend");
        return Ok(Arc::new(HashingBackend::new(hash::DEFAULT_DIM)));
    }

    let kind: String = config
        .get("embedding.backend")
        .unwrap_or_else(|_| "hash".to_string());
    match kind.as_str() {
        "hash" => {
            let dim: usize = config.get("embedding.dim").unwrap_or(hash::DEFAULT_DIM);
            Ok(Arc::new(HashingBackend::new(dim)))
        }
        "local" => {
            let model_dir: String = config.get("embedding.model_dir")?;
            let dim: usize = config.get("embedding.dim").unwrap_or(local::DEFAULT_DIM);
            let path = ragdb_core::config::expand_path(model_dir);
            Ok(Arc::new(LocalBackend::load(&path, dim)?))
        }
        "remote" => {
            let remote: RemoteEmbeddingConfig = config.get("embedding.remote")?;
            Ok(Arc::new(RemoteBackend::new(remote)?))
        }
        other => anyhow::bail!("unknown embedding backend: {other}"),
    }
}
