//! Chain and service tests with an in-memory store and scripted
//! completion backends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use ragdb_chain::{extract_citations, KnowledgeService, RagChain, DEFAULT_K};
use ragdb_core::error::Error;
use ragdb_core::traits::{CompletionBackend, VectorStore};
use ragdb_core::types::{CompletionRequest, IndexedDocument, QueryMatch};
use ragdb_embed::{cosine_similarity, Embedder, HashingBackend};
use ragdb_vector::RetrievalEngine;

const DIM: usize = 64;

#[derive(Default)]
struct MemoryStore {
    rows: Mutex<HashMap<String, IndexedDocument>>,
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, documents: &[IndexedDocument]) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().expect("lock");
        for doc in documents {
            rows.insert(doc.id.clone(), doc.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<QueryMatch>> {
        let rows = self.rows.lock().expect("lock");
        let mut scored: Vec<(f32, QueryMatch)> = rows
            .values()
            .map(|doc| {
                let score = cosine_similarity(vector, &doc.embedding).expect("same dim");
                (
                    score,
                    QueryMatch {
                        id: doc.id.clone(),
                        text: doc.text.clone(),
                        metadata: doc.metadata.clone(),
                    },
                )
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(k).map(|(_, m)| m).collect())
    }

    async fn delete(&self, ids: &[String]) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().expect("lock");
        for id in ids {
            rows.remove(id);
        }
        Ok(())
    }

    async fn count(&self) -> anyhow::Result<usize> {
        Ok(self.rows.lock().expect("lock").len())
    }

    async fn all_ids(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.rows.lock().expect("lock").keys().cloned().collect())
    }
}

/// Records every request it receives and replies with a fixed answer.
struct RecordingBackend {
    answer: String,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl RecordingBackend {
    fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CompletionBackend for RecordingBackend {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().expect("lock") = Some(request.clone());
        Ok(self.answer.clone())
    }
}

struct FailingBackend;

#[async_trait]
impl CompletionBackend for FailingBackend {
    async fn complete(&self, _request: &CompletionRequest) -> anyhow::Result<String> {
        Err(anyhow!("model exploded"))
    }
}

struct SlowBackend;

#[async_trait]
impl CompletionBackend for SlowBackend {
    async fn complete(&self, _request: &CompletionRequest) -> anyhow::Result<String> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok("too late".to_string())
    }
}

fn engine() -> Arc<RetrievalEngine> {
    let embedder = Embedder::new(Arc::new(HashingBackend::new(DIM)));
    Arc::new(RetrievalEngine::new(
        embedder,
        Arc::new(MemoryStore::default()),
    ))
}

async fn seeded_engine(docs: &[&str]) -> Arc<RetrievalEngine> {
    let engine = engine();
    let docs: Vec<String> = docs.iter().map(|d| d.to_string()).collect();
    engine.index(&docs, None, None).await.expect("index");
    engine
}

#[tokio::test]
async fn empty_query_fails_before_any_backend_call() {
    let backend = Arc::new(RecordingBackend::new("unused"));
    let chain = RagChain::new(engine(), backend.clone());

    let err = chain.answer("   ", 3, None).await.expect_err("must fail");
    assert!(matches!(err, Error::EmptyQuery));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn answer_builds_numbered_context_and_citations() {
    let engine = seeded_engine(&[
        "refunds are processed within five business days",
        "shipping takes two weeks for international orders",
        "warranty covers manufacturing defects for one year",
    ])
    .await;
    let backend = Arc::new(RecordingBackend::new("Refunds take five days [1]."));
    let chain = RagChain::new(engine, backend.clone());

    let answer = chain
        .answer("how long do refunds take", 3, None)
        .await
        .expect("answer");

    assert_eq!(answer.answer, "Refunds take five days [1].");
    assert_eq!(answer.sources.len(), 3);
    assert_eq!(answer.citations, vec!["[1]", "[2]", "[3]"]);
    assert_eq!(answer.metrics.chunks_retrieved, 3);

    let request = backend
        .last_request
        .lock()
        .expect("lock")
        .clone()
        .expect("one call");
    assert_eq!(request.question, "how long do refunds take");
    // Context block n starts with the marker that cites source n.
    for (i, source) in answer.sources.iter().enumerate() {
        let block = format!("[{}] {}", i + 1, source.text);
        assert!(request.context.contains(&block));
    }
    assert_eq!(request.context.matches("\n\n").count(), 2);
    assert!((request.temperature - 0.7).abs() < 1e-6);
    assert_eq!(request.max_output_tokens, 1024);
}

#[tokio::test]
async fn answer_attaches_ticket_ref_verbatim() {
    let engine = seeded_engine(&["password reset link expires after one hour"]).await;
    let chain = RagChain::new(engine, Arc::new(RecordingBackend::new("See [1].")));

    let answer = chain
        .answer("reset password", 1, Some("TICKET-42".to_string()))
        .await
        .expect("answer");
    assert_eq!(answer.ticket_ref.as_deref(), Some("TICKET-42"));

    let without = chain.answer("reset password", 1, None).await.expect("answer");
    assert!(without.ticket_ref.is_none());
}

#[tokio::test]
async fn metrics_are_rounded_and_total_covers_both_phases() {
    let engine = seeded_engine(&["billing cycle starts on the first of the month"]).await;
    let chain = RagChain::new(engine, Arc::new(RecordingBackend::new("[1]")));

    let answer = chain.answer("billing cycle", 1, None).await.expect("answer");
    let m = &answer.metrics;
    assert!(m.retrieval_time_ms >= 0.0);
    assert!(m.generation_time_ms >= 0.0);
    assert!(m.total_time_ms + 1e-6 >= m.retrieval_time_ms);
    assert!(m.total_time_ms + 1e-6 >= m.generation_time_ms);
    for value in [m.retrieval_time_ms, m.generation_time_ms, m.total_time_ms] {
        assert!((value * 100.0 - (value * 100.0).round()).abs() < 1e-6);
    }
}

#[tokio::test]
async fn generation_failure_preserves_backend_message() {
    let engine = seeded_engine(&["some indexed knowledge"]).await;
    let chain = RagChain::new(engine, Arc::new(FailingBackend));

    let err = chain
        .answer("anything", 1, None)
        .await
        .expect_err("must fail");
    match err {
        Error::GenerationBackend(source) => {
            assert!(source.to_string().contains("model exploded"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn deadline_exceeded_yields_cancelled() {
    let engine = seeded_engine(&["some indexed knowledge"]).await;
    let chain = RagChain::new(engine, Arc::new(SlowBackend));

    let err = chain
        .answer_with_deadline("anything", 1, None, Duration::from_millis(10))
        .await
        .expect_err("must time out");
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn generous_deadline_still_succeeds() {
    let engine = seeded_engine(&["some indexed knowledge"]).await;
    let chain = RagChain::new(engine, Arc::new(RecordingBackend::new("fine [1]")));

    let answer = chain
        .answer_with_deadline("anything", 1, None, Duration::from_secs(5))
        .await
        .expect("answer");
    assert_eq!(answer.answer, "fine [1]");
}

#[tokio::test]
async fn service_ingest_ask_remove_round_trip() {
    let engine = engine();
    let chain = RagChain::new(engine.clone(), Arc::new(RecordingBackend::new("Yes [1].")));
    let service = KnowledgeService::new(engine, chain);

    let content = format!(
        "{}\n\n{}",
        "Our refund policy allows returns within thirty days of purchase. ".repeat(2),
        "International shipping is available to most countries worldwide. ".repeat(2)
    );
    let receipt = service
        .ingest("Store FAQ", &content, "semantic")
        .await
        .expect("ingest");
    assert_eq!(receipt.chunk_count, 2);
    assert_eq!(receipt.chunk_ids.len(), 2);
    assert_eq!(service.count().await.expect("count"), 2);

    let answer = service
        .ask("can I return my order", DEFAULT_K, None)
        .await
        .expect("ask");
    assert!(!answer.sources.is_empty());
    let top = &answer.sources[0];
    assert_eq!(top.metadata["document_id"], receipt.document_id.as_str());
    assert_eq!(top.metadata["title"], "Store FAQ");
    assert_eq!(top.metadata["chunk_type"], "semantic");

    service
        .remove(&receipt.document_id, &receipt.chunk_ids)
        .await
        .expect("remove");
    assert_eq!(service.count().await.expect("count"), 0);
}

#[tokio::test]
async fn service_rejects_unknown_strategy_and_empty_content() {
    let engine = engine();
    let chain = RagChain::new(engine.clone(), Arc::new(RecordingBackend::new("unused")));
    let service = KnowledgeService::new(engine, chain);

    assert!(matches!(
        service.ingest("Doc", "some text", "recursive").await,
        Err(Error::UnknownStrategy(_))
    ));
    assert!(matches!(
        service.ingest("Doc", "   \n\n  ", "fixed_size").await,
        Err(Error::EmptyInput(_))
    ));
}

#[tokio::test]
async fn extracted_citations_are_a_subset_of_offered_markers() {
    let engine = seeded_engine(&[
        "first knowledge base article about billing",
        "second knowledge base article about shipping",
    ])
    .await;
    let chain = RagChain::new(
        engine,
        Arc::new(RecordingBackend::new("Billing info [1], see also [2].")),
    );

    let answer = chain.answer("billing", 2, None).await.expect("answer");
    let used = extract_citations(&answer.answer);
    for marker in &used {
        assert!(answer.citations.contains(marker));
    }
    assert_eq!(used.len(), 2);
}
