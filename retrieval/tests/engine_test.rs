//! End-to-end engine tests with deterministic in-process backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use selfnotes_documents::{DocumentStream, SourceError};
use selfnotes_embeddings::{EmbedError, Embedding};
use selfnotes_retrieval::{
    AskError, ChunkerConfig, ComposeError, ContentSource, Document, EmbeddingProvider,
    GenerateError, GenerationProvider, NotesEngine, PipelineError, RetrieveError, StaticSource,
    StoreError,
};

const VOCABULARY: [&str; 3] = ["squat", "curl", "run"];

/// Embeds text as keyword counts over a tiny vocabulary.
#[derive(Default)]
struct KeywordEmbedder {
    calls: AtomicUsize,
    poison: Option<&'static str>,
    jitter: bool,
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    fn model(&self) -> &str {
        "keyword-v1"
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.jitter {
            // Later requests finish first.
            tokio::time::sleep(Duration::from_millis(20u64.saturating_sub(call as u64 * 3))).await;
        }
        if self.poison.is_some_and(|poison| text.contains(poison)) {
            return Err(EmbedError::TransportFailure("backend unavailable".to_string()));
        }

        let lower = text.to_lowercase();
        Ok(VOCABULARY
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect())
    }
}

/// Records prompts and answers with a fixed reply.
#[derive(Default)]
struct EchoGenerator {
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl GenerationProvider for EchoGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        "echo-v1"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(GenerateError::TransportFailure("connection refused".to_string()));
        }
        Ok("From your notes: squat deep.".to_string())
    }
}

/// Yields one document and then fails.
struct FlakySource;

impl ContentSource for FlakySource {
    fn name(&self) -> &str {
        "flaky"
    }

    fn fetch_all(&self) -> DocumentStream<'_> {
        stream::iter(vec![
            Ok(Document::new("legs", "Legs", "", "squat")),
            Err(SourceError::Timeout),
        ])
        .boxed()
    }
}

fn workout_notes() -> StaticSource {
    StaticSource::new(vec![
        Document::new("legs", "Legs", "https://notion.so/legs", "Squat day. Squat deep, squat often."),
        Document::new("arms", "Arms", "https://notion.so/arms", "Curl twice a week."),
        Document::new("cardio", "Cardio", "", "Run far. Then run back."),
    ])
}

struct Harness {
    _dir: TempDir,
    engine: NotesEngine,
    embedder: Arc<KeywordEmbedder>,
    generator: Arc<EchoGenerator>,
}

fn harness(
    dir: TempDir,
    source: Arc<dyn ContentSource>,
    embedder: KeywordEmbedder,
    generator: EchoGenerator,
    top_k: usize,
) -> Harness {
    let embedder = Arc::new(embedder);
    let generator = Arc::new(generator);
    let engine = NotesEngine::builder()
        .with_db_dir(dir.path().join("db"))
        .with_source(source)
        .with_embedder(embedder.clone())
        .with_generator(generator.clone())
        .with_top_k(top_k)
        .build()
        .unwrap();
    Harness {
        _dir: dir,
        engine,
        embedder,
        generator,
    }
}

fn indexed_with(source: Arc<dyn ContentSource>) -> Harness {
    harness(
        TempDir::new().unwrap(),
        source,
        KeywordEmbedder::default(),
        EchoGenerator::default(),
        1,
    )
}

#[tokio::test]
async fn test_index_then_ask() {
    let h = indexed_with(Arc::new(workout_notes()));

    let stats = h.engine.index().await.unwrap();
    assert_eq!(stats.documents, 3);
    assert_eq!(stats.chunks, 3);

    let answer = h.engine.ask("  How deep should I squat?  ").await.unwrap();

    assert_eq!(answer.text, "From your notes: squat deep.");
    let titles: Vec<_> = answer.sources.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Legs"]);

    let prompts = h.generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("[From: Legs | https://notion.so/legs]\nSquat day."));
    assert!(prompts[0].contains("Question: How deep should I squat?\n"));
    assert!(!prompts[0].contains("Curl twice"));
}

#[tokio::test]
async fn test_index_counts_chunks() {
    let dir = TempDir::new().unwrap();
    let engine = NotesEngine::builder()
        .with_db_dir(dir.path())
        .with_source(Arc::new(StaticSource::new(vec![
            Document::new("a", "A", "", "abcdefghij"),
            Document::new("b", "B", "", "abc"),
            Document::new("c", "C", "", ""),
        ])))
        .with_embedder(Arc::new(KeywordEmbedder::default()))
        .with_generator(Arc::new(EchoGenerator::default()))
        .with_chunking(ChunkerConfig::new(4, 1))
        .build()
        .unwrap();

    let stats = engine.index().await.unwrap();

    assert_eq!(stats.documents, 3);
    assert_eq!(stats.chunks, 4);
    let index = engine.store().load().await.unwrap();
    let texts: Vec<_> = index.chunks().iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["abcd", "defg", "ghij", "abc"]);
}

#[tokio::test]
async fn test_concurrent_embedding_keeps_chunk_order() {
    let notes = StaticSource::new(
        (0..6)
            .map(|i| {
                let text = "squat ".repeat(i + 1) + &"curl ".repeat(6 - i);
                Document::new(format!("doc-{i}"), format!("Doc {i}"), "", text)
            })
            .collect(),
    );
    let h = harness(
        TempDir::new().unwrap(),
        Arc::new(notes),
        KeywordEmbedder {
            jitter: true,
            ..Default::default()
        },
        EchoGenerator::default(),
        1,
    );

    h.engine.index().await.unwrap();

    let index = h.engine.store().load().await.unwrap();
    for (i, chunk) in index.chunks().iter().enumerate() {
        assert_eq!(chunk.source_id, format!("doc-{i}"));
        assert_eq!(
            index.vector(i).unwrap(),
            &[(i + 1) as f32, (6 - i) as f32, 0.0][..]
        );
    }
}

#[tokio::test]
async fn test_embed_failure_keeps_previous_index() {
    let dir = TempDir::new().unwrap();
    let db_dir = dir.path().join("db");

    let good = NotesEngine::builder()
        .with_db_dir(&db_dir)
        .with_source(Arc::new(workout_notes()))
        .with_embedder(Arc::new(KeywordEmbedder::default()))
        .with_generator(Arc::new(EchoGenerator::default()))
        .build()
        .unwrap();
    good.index().await.unwrap();

    let mut notes = workout_notes();
    notes.push(Document::new("bad", "Bad", "", "poisoned page"));
    let failing = NotesEngine::builder()
        .with_db_dir(&db_dir)
        .with_source(Arc::new(notes))
        .with_embedder(Arc::new(KeywordEmbedder {
            poison: Some("poison"),
            ..Default::default()
        }))
        .with_generator(Arc::new(EchoGenerator::default()))
        .build()
        .unwrap();

    match failing.index().await {
        Err(PipelineError::EmbedFailed {
            source_id,
            chunk_index,
            ..
        }) => {
            assert_eq!(source_id, "bad");
            assert_eq!(chunk_index, 0);
        }
        other => panic!("expected embed failure, got {other:?}"),
    }

    let sources = good.list_sources().await.unwrap();
    let ids: Vec<_> = sources.iter().map(|s| s.source_id.as_str()).collect();
    assert_eq!(ids, vec!["legs", "arms", "cardio"]);
}

#[tokio::test]
async fn test_fetch_failure_aborts_before_embedding() {
    let h = indexed_with(Arc::new(FlakySource));

    let result = h.engine.index().await;

    assert!(matches!(
        result,
        Err(PipelineError::FetchFailed(SourceError::Timeout))
    ));
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    assert!(!h.engine.store().exists().await);
}

#[tokio::test]
async fn test_ask_before_index_is_not_found() {
    let h = indexed_with(Arc::new(workout_notes()));

    let result = h.engine.ask("anything?").await;

    assert!(matches!(
        result,
        Err(AskError::Retrieve(RetrieveError::StoreUnavailable(
            StoreError::NotFound(_)
        )))
    ));
    assert!(h.generator.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_ask_on_empty_index_fails_fast() {
    let h = indexed_with(Arc::new(StaticSource::default()));
    let stats = h.engine.index().await.unwrap();
    assert_eq!(stats.chunks, 0);

    let result = h.engine.ask("anything?").await;

    assert!(matches!(
        result,
        Err(AskError::Retrieve(RetrieveError::StoreUnavailable(
            StoreError::EmptyIndex
        )))
    ));
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    assert!(h.generator.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_question_is_rejected() {
    let h = indexed_with(Arc::new(workout_notes()));
    assert!(matches!(
        h.engine.ask(" \n ").await,
        Err(AskError::EmptyQuestion)
    ));
}

#[tokio::test]
async fn test_generation_failure_surfaces() {
    let h = harness(
        TempDir::new().unwrap(),
        Arc::new(workout_notes()),
        KeywordEmbedder::default(),
        EchoGenerator {
            fail: true,
            ..Default::default()
        },
        2,
    );
    h.engine.index().await.unwrap();

    let result = h.engine.ask("curl?").await;
    assert!(matches!(
        result,
        Err(AskError::Compose(ComposeError::GenerateFailed(
            GenerateError::TransportFailure(_)
        )))
    ));
}

#[tokio::test]
async fn test_list_sources_deduplicates() {
    let dir = TempDir::new().unwrap();
    let engine = NotesEngine::builder()
        .with_db_dir(dir.path())
        .with_source(Arc::new(StaticSource::new(vec![
            Document::new("long", "Long", "https://n/long", "squat ".repeat(20))
                .with_last_edited("2024-05-01T10:00:00.000Z"),
            Document::new("short", "Short", "https://n/short", "run"),
        ])))
        .with_embedder(Arc::new(KeywordEmbedder::default()))
        .with_generator(Arc::new(EchoGenerator::default()))
        .with_chunking(ChunkerConfig::new(30, 5))
        .build()
        .unwrap();

    let stats = engine.index().await.unwrap();
    assert!(stats.chunks > 2);

    let sources = engine.list_sources().await.unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].title, "Long");
    assert_eq!(
        sources[0].last_edited.as_deref(),
        Some("2024-05-01T10:00:00.000Z")
    );
    assert_eq!(sources[1].url, "https://n/short");
}

#[tokio::test]
async fn test_reindex_replaces_corpus() {
    let dir = TempDir::new().unwrap();
    let db_dir = dir.path().join("db");
    let build = |docs: Vec<Document>| {
        NotesEngine::builder()
            .with_db_dir(&db_dir)
            .with_source(Arc::new(StaticSource::new(docs)))
            .with_embedder(Arc::new(KeywordEmbedder::default()))
            .with_generator(Arc::new(EchoGenerator::default()))
            .build()
            .unwrap()
    };

    build(vec![Document::new("old", "Old", "", "squat")])
        .index()
        .await
        .unwrap();
    let engine = build(vec![Document::new("new", "New", "", "curl")]);
    engine.index().await.unwrap();

    let sources = engine.list_sources().await.unwrap();
    let ids: Vec<_> = sources.iter().map(|s| s.source_id.as_str()).collect();
    assert_eq!(ids, vec!["new"]);
}
