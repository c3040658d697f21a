//! Embedding store persistence and search tests.

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use selfnotes_documents::Document;
use selfnotes_embeddings::{EmbeddingRecord, EmbeddingStore, StoreError};

fn record(source: &str, chunk_index: usize, vector: Vec<f32>) -> EmbeddingRecord {
    let doc = Document::new(
        source,
        format!("Page {source}"),
        format!("https://notion.so/{source}"),
        "",
    );
    EmbeddingRecord::new(vector, doc.chunk(chunk_index, format!("{source} chunk {chunk_index}")))
}

fn scenario_records() -> Vec<EmbeddingRecord> {
    vec![
        record("r0", 0, vec![1.0, 0.0]),
        record("r1", 0, vec![0.0, 1.0]),
        record("r2", 0, vec![0.7, 0.7]),
    ]
}

fn current_generation(dir: &TempDir) -> std::path::PathBuf {
    let name = std::fs::read_to_string(dir.path().join("CURRENT")).unwrap();
    dir.path().join("generations").join(name.trim())
}

#[tokio::test]
async fn test_rebuild_then_load_preserves_records() {
    let dir = TempDir::new().unwrap();
    let store = EmbeddingStore::new(dir.path());
    let records = scenario_records();

    store.rebuild(records.clone()).await.unwrap();
    let loaded = store.load().await.unwrap();

    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.dimension(), 2);
    assert!(loaded.created_at().is_some());
    assert_eq!(loaded.into_records(), records);
}

#[tokio::test]
async fn test_search_ranks_by_cosine() {
    let dir = TempDir::new().unwrap();
    let store = EmbeddingStore::new(dir.path());
    store.rebuild(scenario_records()).await.unwrap();

    let hits = store.search(&[1.0, 0.0], 2).await.unwrap();

    let ids: Vec<_> = hits.iter().map(|h| h.chunk.source_id.as_str()).collect();
    assert_eq!(ids, vec!["r0", "r2"]);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert!((hits[1].score - 0.7071).abs() < 1e-3);
}

#[tokio::test]
async fn test_equal_scores_keep_store_order() {
    let dir = TempDir::new().unwrap();
    let store = EmbeddingStore::new(dir.path());
    store
        .rebuild(vec![
            record("a", 0, vec![0.0, 1.0]),
            record("b", 0, vec![2.0, 0.0]),
            record("c", 0, vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

    for _ in 0..3 {
        let hits = store.search(&[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.chunk.source_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }
}

#[tokio::test]
async fn test_empty_index_search_fails() {
    let dir = TempDir::new().unwrap();
    let store = EmbeddingStore::new(dir.path());
    store.rebuild(Vec::new()).await.unwrap();

    let loaded = store.load().await.unwrap();
    assert!(loaded.is_empty());
    assert!(matches!(
        store.search(&[1.0, 0.0], 4).await,
        Err(StoreError::EmptyIndex)
    ));
}

#[tokio::test]
async fn test_query_dimension_mismatch() {
    let dir = TempDir::new().unwrap();
    let store = EmbeddingStore::new(dir.path());
    store.rebuild(scenario_records()).await.unwrap();

    let result = store.search(&[1.0, 0.0, 0.0], 2).await;
    assert!(matches!(
        result,
        Err(StoreError::DimensionMismatch { expected: 2, actual: 3 })
    ));
}

#[tokio::test]
async fn test_mixed_dimensions_are_rejected_before_writing() {
    let dir = TempDir::new().unwrap();
    let store = EmbeddingStore::new(dir.path());

    let result = store
        .rebuild(vec![record("a", 0, vec![1.0, 0.0]), record("b", 0, vec![1.0])])
        .await;

    assert!(matches!(result, Err(StoreError::DimensionMismatch { .. })));
    assert!(!store.exists().await);
}

#[tokio::test]
async fn test_rebuild_replaces_previous_index() {
    let dir = TempDir::new().unwrap();
    let store = EmbeddingStore::new(dir.path());
    store.rebuild(scenario_records()).await.unwrap();

    store
        .rebuild(vec![record("fresh", 0, vec![0.5, 0.5, 0.5])])
        .await
        .unwrap();

    let loaded = store.load().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.dimension(), 3);
    assert_eq!(loaded.chunks()[0].source_id, "fresh");
}

#[tokio::test]
async fn test_failed_commit_keeps_previous_index() {
    let dir = TempDir::new().unwrap();
    let store = EmbeddingStore::new(dir.path());
    store.rebuild(scenario_records()).await.unwrap();

    // A directory in the pointer's staging slot makes the final swap fail.
    std::fs::create_dir(dir.path().join("CURRENT.tmp")).unwrap();

    let result = store.rebuild(vec![record("new", 0, vec![0.0, 1.0])]).await;
    assert!(matches!(result, Err(StoreError::WriteFailed(_))));

    let loaded = store.load().await.unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.chunks()[0].source_id, "r0");

    let generations = std::fs::read_dir(dir.path().join("generations"))
        .unwrap()
        .count();
    assert_eq!(generations, 1);
}

#[tokio::test]
async fn test_snapshot_survives_rebuild() {
    let dir = TempDir::new().unwrap();
    let store = EmbeddingStore::new(dir.path());
    store.rebuild(scenario_records()).await.unwrap();

    let snapshot = store.load().await.unwrap();
    store
        .rebuild(vec![record("other", 0, vec![1.0, 1.0])])
        .await
        .unwrap();

    let hits = snapshot.search(&[1.0, 0.0], 1).unwrap();
    assert_eq!(hits[0].chunk.source_id, "r0");
}

#[tokio::test]
async fn test_truncated_vectors_are_corrupt() {
    let dir = TempDir::new().unwrap();
    let store = EmbeddingStore::new(dir.path());
    store.rebuild(scenario_records()).await.unwrap();

    let vectors = current_generation(&dir).join("vectors.bin");
    let bytes = std::fs::read(&vectors).unwrap();
    std::fs::write(&vectors, &bytes[..bytes.len() - 4]).unwrap();

    assert!(matches!(store.load().await, Err(StoreError::Corrupt(_))));
}

#[tokio::test]
async fn test_metadata_count_mismatch_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let store = EmbeddingStore::new(dir.path());
    store.rebuild(scenario_records()).await.unwrap();

    let metadata_path = current_generation(&dir).join("metadata.json");
    let mut metadata: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&metadata_path).unwrap()).unwrap();
    metadata["chunks"].as_array_mut().unwrap().pop();
    std::fs::write(&metadata_path, serde_json::to_vec(&metadata).unwrap()).unwrap();

    assert!(matches!(store.load().await, Err(StoreError::Corrupt(_))));
}

#[tokio::test]
async fn test_missing_store_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = EmbeddingStore::new(dir.path().join("never-built"));

    let result = store.search(&[1.0], 1).await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}
