//! The facade the outer layers (CLI, HTTP, UI) call into: ingest a
//! document, ask a question, remove a document's chunks.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use ragdb_core::chunker::{chunker_for_strategy, ChunkerParams};
use ragdb_core::error::{Error, Result};
use ragdb_core::types::{IngestReceipt, Metadata, RagAnswer};
use ragdb_vector::RetrievalEngine;

use crate::chain::RagChain;

/// Default number of chunks retrieved per question.
pub const DEFAULT_K: usize = 5;

pub struct KnowledgeService {
    engine: Arc<RetrievalEngine>,
    chain: RagChain,
    chunker_params: ChunkerParams,
}

impl KnowledgeService {
    pub fn new(engine: Arc<RetrievalEngine>, chain: RagChain) -> Self {
        Self {
            engine,
            chain,
            chunker_params: ChunkerParams::default(),
        }
    }

    pub fn with_chunker_params(mut self, params: ChunkerParams) -> Self {
        self.chunker_params = params;
        self
    }

    /// Chunk `content` with the named strategy and index every chunk. Each
    /// chunk's metadata is tagged with the generated `document_id` and the
    /// document `title` so the whole document can be removed later.
    pub async fn ingest(
        &self,
        title: &str,
        content: &str,
        strategy: &str,
    ) -> Result<IngestReceipt> {
        let chunker = chunker_for_strategy(strategy, &self.chunker_params)?;
        let chunks = chunker.chunk(content);
        if chunks.is_empty() {
            return Err(Error::EmptyInput(
                "document produced no chunks".to_string(),
            ));
        }

        let document_id = Uuid::new_v4().to_string();
        let mut texts = Vec::with_capacity(chunks.len());
        let mut ids = Vec::with_capacity(chunks.len());
        let mut metadatas: Vec<Metadata> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let mut metadata = chunk.metadata;
            metadata.insert("document_id".to_string(), json!(document_id));
            metadata.insert("title".to_string(), json!(title));
            texts.push(chunk.text);
            ids.push(chunk.id);
            metadatas.push(metadata);
        }

        let chunk_ids = self
            .engine
            .index(&texts, Some(ids), Some(metadatas))
            .await?;
        tracing::info!(
            %document_id,
            title,
            strategy,
            chunks = chunk_ids.len(),
            "document ingested"
        );
        Ok(IngestReceipt {
            document_id,
            chunk_count: chunk_ids.len(),
            chunk_ids,
        })
    }

    pub async fn ask(
        &self,
        question: &str,
        k: usize,
        ticket_ref: Option<String>,
    ) -> Result<RagAnswer> {
        self.chain.answer(question, k, ticket_ref).await
    }

    pub async fn ask_with_deadline(
        &self,
        question: &str,
        k: usize,
        ticket_ref: Option<String>,
        deadline: Duration,
    ) -> Result<RagAnswer> {
        self.chain
            .answer_with_deadline(question, k, ticket_ref, deadline)
            .await
    }

    /// Remove a previously ingested document by deleting its chunk ids
    /// (from the [`IngestReceipt`]). Unknown ids are a no-op.
    pub async fn remove(&self, document_id: &str, chunk_ids: &[String]) -> Result<()> {
        self.engine.delete(chunk_ids).await?;
        tracing::info!(document_id, chunks = chunk_ids.len(), "document removed");
        Ok(())
    }

    pub async fn count(&self) -> Result<usize> {
        self.engine.count().await
    }

    pub async fn clear(&self) -> Result<()> {
        self.engine.clear().await
    }
}
