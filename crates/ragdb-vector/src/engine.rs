//! Retrieval engine: embedder + vector store composition.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::VectorStore;
use ragdb_core::types::{IndexedDocument, Metadata, SearchResult};
use ragdb_embed::Embedder;

/// Composes an [`Embedder`] and a [`VectorStore`] into the caller-facing
/// `index` / `search` / `delete` / `count` / `clear` operations.
///
/// Indexing is all-or-nothing per batch: one embed call, then one upsert.
/// A failure (or cancellation) in either leaves nothing partially written.
pub struct RetrievalEngine {
    embedder: Embedder,
    store: Arc<dyn VectorStore>,
}

impl RetrievalEngine {
    pub fn new(embedder: Embedder, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// Index a batch of documents and return their ids. Ids are generated
    /// when not supplied. Blank documents are dropped together with their
    /// aligned id/metadata so the remaining triples stay in sync with the
    /// embedder's own filtering.
    pub async fn index(
        &self,
        documents: &[String],
        ids: Option<Vec<String>>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<Vec<String>> {
        if documents.is_empty() {
            return Err(Error::InvalidArgument(
                "documents cannot be empty".to_string(),
            ));
        }
        if let Some(ids) = &ids {
            if ids.len() != documents.len() {
                return Err(Error::InvalidArgument(format!(
                    "ids length ({}) must match documents length ({})",
                    ids.len(),
                    documents.len()
                )));
            }
        }
        if let Some(metadatas) = &metadatas {
            if metadatas.len() != documents.len() {
                return Err(Error::InvalidArgument(format!(
                    "metadatas length ({}) must match documents length ({})",
                    metadatas.len(),
                    documents.len()
                )));
            }
        }

        let ids = ids
            .unwrap_or_else(|| documents.iter().map(|_| Uuid::new_v4().to_string()).collect());
        let metadatas =
            metadatas.unwrap_or_else(|| documents.iter().map(|_| Metadata::new()).collect());

        let mut kept_texts = Vec::with_capacity(documents.len());
        let mut kept_ids = Vec::with_capacity(documents.len());
        let mut kept_metas = Vec::with_capacity(documents.len());
        for ((text, id), meta) in documents.iter().zip(ids).zip(metadatas) {
            if text.trim().is_empty() {
                continue;
            }
            kept_texts.push(text.clone());
            kept_ids.push(id);
            kept_metas.push(meta);
        }
        if kept_texts.is_empty() {
            return Err(Error::InvalidArgument(
                "no non-empty documents provided".to_string(),
            ));
        }

        // One embed call for the whole batch; a backend failure aborts the
        // insert before anything reaches the store.
        let embeddings = self.embedder.embed_many(&kept_texts).await?;

        let indexed_at = Utc::now().to_rfc3339();
        let docs: Vec<IndexedDocument> = kept_ids
            .iter()
            .zip(kept_texts)
            .zip(embeddings)
            .zip(kept_metas)
            .map(|(((id, text), embedding), mut metadata)| {
                metadata.insert("indexed_at".to_string(), json!(indexed_at));
                IndexedDocument {
                    id: id.clone(),
                    embedding,
                    text,
                    metadata,
                }
            })
            .collect();

        self.store
            .upsert(&docs)
            .await
            .map_err(Error::RetrievalBackend)?;
        tracing::info!(count = docs.len(), "indexed documents");
        Ok(kept_ids)
    }

    /// Nearest-neighbor search, best-first. The relevance score is derived
    /// from rank (`1 - rank/k`), a deliberate fallback for stores that do
    /// not surface a comparable native similarity; it guarantees strictly
    /// decreasing, evenly spaced scores.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidArgument("query cannot be empty".to_string()));
        }
        if k == 0 {
            return Err(Error::InvalidArgument(
                "k must be greater than 0".to_string(),
            ));
        }

        let query_vector = self.embedder.embed_one(query).await?;
        let matches = self
            .store
            .query(&query_vector, k)
            .await
            .map_err(Error::RetrievalBackend)?;

        let results: Vec<SearchResult> = matches
            .into_iter()
            .enumerate()
            .map(|(rank, m)| SearchResult {
                id: m.id,
                text: m.text,
                score: 1.0 - (rank as f32 / k as f32),
                metadata: m.metadata,
            })
            .collect();
        tracing::debug!(k, returned = results.len(), "search complete");
        Ok(results)
    }

    /// Delete by id; unknown ids are a no-op.
    pub async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Err(Error::InvalidArgument("ids cannot be empty".to_string()));
        }
        self.store
            .delete(ids)
            .await
            .map_err(Error::RetrievalBackend)
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count().await.map_err(Error::RetrievalBackend)
    }

    /// Best-effort clear: fetch every id, then delete. Inserts racing the
    /// clear may survive; that is accepted.
    pub async fn clear(&self) -> Result<()> {
        let ids = self
            .store
            .all_ids()
            .await
            .map_err(Error::RetrievalBackend)?;
        if ids.is_empty() {
            return Ok(());
        }
        self.store
            .delete(&ids)
            .await
            .map_err(Error::RetrievalBackend)
    }
}
