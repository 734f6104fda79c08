//! Domain types shared by the chunking, embedding, retrieval and chain layers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Free-form per-document metadata, JSON-valued.
pub type Metadata = HashMap<String, serde_json::Value>;

/// A fixed-length dense embedding. Every vector stored in one collection
/// shares the dimensionality established by the embedding model.
pub type EmbeddingVector = Vec<f32>;

/// A contiguous segment of one source document, produced by a chunking
/// strategy. Immutable after creation and never shared across documents.
///
/// Metadata always carries `chunk_index` (0-based position within the
/// source) and `chunk_type` (the strategy that produced it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

impl Chunk {
    /// Create a chunk with a freshly generated id.
    pub fn new(text: String, metadata: Metadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            metadata,
        }
    }
}

/// One ranked hit from the retrieval engine. Ephemeral: produced per query,
/// never persisted by the core. `score` is higher-is-better and
/// non-increasing by rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub metadata: Metadata,
}

/// The unit stored in the vector index. Updated never: re-index as
/// delete + insert.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub id: String,
    pub embedding: EmbeddingVector,
    pub text: String,
    pub metadata: Metadata,
}

/// A row returned by a vector-store nearest-neighbor query, before the
/// engine attaches a relevance score.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// Wall-clock metrics for one answered query, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerMetrics {
    pub retrieval_time_ms: f64,
    pub generation_time_ms: f64,
    pub total_time_ms: f64,
    pub chunks_retrieved: usize,
}

/// A cited answer produced by the RAG chain. Built fresh per query; the
/// caller owns it and may persist it externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    /// Retrieved sources in context order (source `n` backs marker `[n]`).
    pub sources: Vec<SearchResult>,
    /// Parallel citation markers, `"[1]"` through `"[N]"`.
    pub citations: Vec<String>,
    pub metrics: AnswerMetrics,
    /// Opaque caller reference, attached verbatim and never persisted here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_ref: Option<String>,
}

/// One completion round trip. The chain treats generation as a single
/// request/response; streaming is out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_instruction: String,
    pub context: String,
    pub question: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// Receipt for one ingested document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub document_id: String,
    pub chunk_count: usize,
    pub chunk_ids: Vec<String>,
}
