//! Boundary contracts for the external services behind the core.
//!
//! Implementations live in `ragdb-embed` (embedding models),
//! `ragdb-vector` (vector stores) and `ragdb-chain` (completion clients).
//! Traits return `anyhow::Result`; the service layers wrap failures into
//! the typed variants of [`crate::error::Error`] without losing the cause.

use async_trait::async_trait;

use crate::types::{CompletionRequest, EmbeddingVector, IndexedDocument, QueryMatch};

/// An embedding model. Must return one vector per input text, in input
/// order, and be deterministic for a fixed model configuration.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Dimensionality of every vector this backend produces.
    fn dim(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<EmbeddingVector>>;
}

/// A named collection supporting nearest-neighbor lookup. The collection
/// is created lazily on first use; the store is externally synchronized
/// (the core issues whole-batch calls and takes no client-side locks).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert-or-replace the given documents as one batch.
    async fn upsert(&self, documents: &[IndexedDocument]) -> anyhow::Result<()>;

    /// K-nearest-neighbor query, ordered best-first.
    async fn query(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<QueryMatch>>;

    /// Delete by id. Unknown ids are a no-op.
    async fn delete(&self, ids: &[String]) -> anyhow::Result<()>;

    /// Number of stored documents.
    async fn count(&self) -> anyhow::Result<usize>;

    /// Every stored id. Used by best-effort clear.
    async fn all_ids(&self) -> anyhow::Result<Vec<String>>;
}

/// A generative completion service: one request, one text response.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String>;
}
