//! End-to-end retrieval tests against a real LanceDB directory, using the
//! deterministic hashing embedder.

use std::sync::Arc;

use ragdb_core::traits::VectorStore;
use ragdb_embed::{Embedder, HashingBackend};
use ragdb_vector::{LanceVectorStore, RetrievalEngine};

const DIM: usize = 64;

async fn engine_in(dir: &tempfile::TempDir) -> anyhow::Result<RetrievalEngine> {
    let uri = dir.path().to_string_lossy().to_string();
    let store = LanceVectorStore::connect(&uri, "knowledge_base", DIM).await?;
    let embedder = Embedder::new(Arc::new(HashingBackend::new(DIM)));
    Ok(RetrievalEngine::new(embedder, Arc::new(store)))
}

#[tokio::test]
async fn index_then_search_returns_best_match_with_rank_score() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let engine = engine_in(&tmp).await?;

    let docs = vec![
        "alpha policy text".to_string(),
        "beta policy text".to_string(),
    ];
    engine.index(&docs, None, None).await?;

    let results = engine.search("alpha", 1).await?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "alpha policy text");
    assert!((results[0].score - 1.0).abs() < 1e-6);
    Ok(())
}

#[tokio::test]
async fn search_scores_decrease_evenly_with_rank() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let engine = engine_in(&tmp).await?;

    let docs: Vec<String> = (0..5)
        .map(|i| format!("troubleshooting guide section {i}"))
        .collect();
    engine.index(&docs, None, None).await?;

    let results = engine.search("troubleshooting guide section 2", 3).await?;
    assert_eq!(results.len(), 3);
    assert!((results[0].score - 1.0).abs() < 1e-6);
    assert!((results[1].score - 0.6667).abs() < 1e-3);
    assert!((results[2].score - 0.3333).abs() < 1e-3);
    Ok(())
}

#[tokio::test]
async fn index_delete_count_round_trip() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let engine = engine_in(&tmp).await?;

    let before = engine.count().await?;
    assert_eq!(before, 0);

    let docs = vec![
        "refund policy".to_string(),
        "shipping policy".to_string(),
        "warranty policy".to_string(),
    ];
    let ids = engine.index(&docs, None, None).await?;
    assert_eq!(engine.count().await?, 3);

    engine.delete(&ids).await?;
    assert_eq!(engine.count().await?, before);
    Ok(())
}

#[tokio::test]
async fn upsert_replaces_documents_with_same_id() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let engine = engine_in(&tmp).await?;

    let ids = vec!["doc-1".to_string()];
    engine
        .index(&["original text".to_string()], Some(ids.clone()), None)
        .await?;
    engine
        .index(&["replacement text".to_string()], Some(ids), None)
        .await?;

    assert_eq!(engine.count().await?, 1);
    let results = engine.search("replacement text", 1).await?;
    assert_eq!(results[0].id, "doc-1");
    assert_eq!(results[0].text, "replacement text");
    Ok(())
}

#[tokio::test]
async fn metadata_survives_the_store_round_trip() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let engine = engine_in(&tmp).await?;

    let mut meta = ragdb_core::types::Metadata::new();
    meta.insert("title".to_string(), serde_json::json!("Refund FAQ"));
    meta.insert("chunk_index".to_string(), serde_json::json!(0));
    engine
        .index(
            &["all refunds are processed within five business days".to_string()],
            Some(vec!["chunk-0".to_string()]),
            Some(vec![meta]),
        )
        .await?;

    let results = engine.search("refunds processed", 1).await?;
    assert_eq!(results[0].metadata["title"], "Refund FAQ");
    assert_eq!(results[0].metadata["chunk_index"], 0);
    assert!(results[0].metadata.contains_key("indexed_at"));
    Ok(())
}

#[tokio::test]
async fn clear_removes_every_document() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let engine = engine_in(&tmp).await?;

    let docs: Vec<String> = (0..8).map(|i| format!("kb article {i}")).collect();
    engine.index(&docs, None, None).await?;
    assert_eq!(engine.count().await?, 8);

    engine.clear().await?;
    assert_eq!(engine.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn store_count_and_query_work_before_first_insert() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let uri = tmp.path().to_string_lossy().to_string();
    let store = LanceVectorStore::connect(&uri, "knowledge_base", DIM).await?;

    // Collection is created lazily; reads against a missing table are empty,
    // not errors.
    assert_eq!(store.count().await?, 0);
    assert!(store.query(&vec![0.0; DIM], 3).await?.is_empty());
    store.delete(&["ghost".to_string()]).await?;
    Ok(())
}
