//! The retrieve-then-generate chain.
//!
//! Per query: validate, retrieve top-k, assemble a numbered context window,
//! issue one completion request, and package the answer with sources,
//! citation markers and wall-clock metrics. No state survives across
//! queries and nothing is persisted here.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use regex::Regex;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::CompletionBackend;
use ragdb_core::types::{AnswerMetrics, CompletionRequest, RagAnswer};
use ragdb_vector::RetrievalEngine;

/// Constrains the model to the supplied context and `[n]` citations.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful customer support assistant. \
    Use ONLY the provided context to answer questions. \
    Cite your sources using [1], [2], [3] notation. \
    If the answer is not in the context, say so clearly.";

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;

pub struct RagChain {
    engine: Arc<RetrievalEngine>,
    completion: Arc<dyn CompletionBackend>,
    system_instruction: String,
    temperature: f32,
    max_output_tokens: u32,
}

fn round2(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

impl RagChain {
    pub fn new(engine: Arc<RetrievalEngine>, completion: Arc<dyn CompletionBackend>) -> Self {
        Self {
            engine,
            completion,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn with_generation_limits(mut self, temperature: f32, max_output_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Answer a question from the indexed knowledge. Fails with
    /// `EmptyQuery` before any external call when the query is blank. The
    /// chain never retries a backend failure; retry policy belongs to the
    /// caller.
    pub async fn answer(
        &self,
        query: &str,
        k: usize,
        ticket_ref: Option<String>,
    ) -> Result<RagAnswer> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }

        let retrieval_start = Instant::now();
        let results = self.engine.search(query, k).await?;
        let retrieval_raw = elapsed_ms(retrieval_start);
        tracing::debug!(
            chunks = results.len(),
            elapsed_ms = retrieval_raw,
            "retrieval complete"
        );

        // Sources are numbered 1..N best-first; marker [n] cites source n.
        let mut context_blocks = Vec::with_capacity(results.len());
        let mut citations = Vec::with_capacity(results.len());
        for (i, result) in results.iter().enumerate() {
            let n = i + 1;
            context_blocks.push(format!("[{n}] {}", result.text));
            citations.push(format!("[{n}]"));
        }
        let context = context_blocks.join("\n\n");

        let request = CompletionRequest {
            system_instruction: self.system_instruction.clone(),
            context,
            question: query.to_string(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        };

        let generation_start = Instant::now();
        let answer = self
            .completion
            .complete(&request)
            .await
            .map_err(Error::GenerationBackend)?;
        let generation_raw = elapsed_ms(generation_start);
        tracing::debug!(elapsed_ms = generation_raw, "generation complete");

        let chunks_retrieved = results.len();
        Ok(RagAnswer {
            answer,
            sources: results,
            citations,
            metrics: AnswerMetrics {
                retrieval_time_ms: round2(retrieval_raw),
                generation_time_ms: round2(generation_raw),
                total_time_ms: round2(retrieval_raw + generation_raw),
                chunks_retrieved,
            },
            ticket_ref,
        })
    }

    /// Like [`RagChain::answer`], aborted with `Cancelled` once `deadline`
    /// elapses, whichever external call is in flight. A cancelled index or
    /// retrieval leaves no partial writes (indexing is one batch upsert).
    pub async fn answer_with_deadline(
        &self,
        query: &str,
        k: usize,
        ticket_ref: Option<String>,
        deadline: Duration,
    ) -> Result<RagAnswer> {
        match tokio::time::timeout(deadline, self.answer(query, k, ticket_ref)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Cancelled),
        }
    }
}

/// Distinct `[n]` markers present in generated text, used to check that the
/// model cited sources it was actually given. Order is not guaranteed.
pub fn extract_citations(text: &str) -> HashSet<String> {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    let marker = MARKER.get_or_init(|| Regex::new(r"\[\d+\]").expect("marker pattern compiles"));
    marker.find_iter(text).map(|m| m.as_str().to_string()).collect()
}
