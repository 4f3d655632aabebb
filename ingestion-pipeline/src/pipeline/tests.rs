use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            document::{Document, DocumentStatus},
            text_chunk::TextChunk,
        },
    },
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    config::{IngestionConfig, IngestionTuning},
    services::PipelineServices,
    IngestionPipeline,
};

const TEST_EMBEDDING_DIM: usize = 3;

struct MockServices {
    text: String,
    fail_on_embed_call: Option<usize>,
    embed_calls: AtomicUsize,
    calls: Mutex<Vec<&'static str>>,
}

impl MockServices {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fail_on_embed_call: None,
            embed_calls: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing_on_embed_call(text: &str, call: usize) -> Self {
        Self {
            fail_on_embed_call: Some(call),
            ..Self::new(text)
        }
    }

    async fn record(&self, stage: &'static str) {
        self.calls.lock().await.push(stage);
    }
}

#[async_trait]
impl PipelineServices for MockServices {
    async fn extract_text(&self, _document: &Document) -> Result<String, AppError> {
        self.record("extract").await;
        Ok(self.text.clone())
    }

    async fn embed_chunk(&self, _text: &str) -> Result<Vec<f32>, AppError> {
        self.record("embed").await;
        let call = self.embed_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_embed_call == Some(call) {
            return Err(AppError::Embedding("mock rate limit".to_string()));
        }
        Ok(vec![1.0, 0.0, 0.0])
    }
}

struct UnreadableDocumentServices;

#[async_trait]
impl PipelineServices for UnreadableDocumentServices {
    async fn extract_text(&self, _document: &Document) -> Result<String, AppError> {
        Err(AppError::Extraction("mock unreadable document".to_string()))
    }

    async fn embed_chunk(&self, _text: &str) -> Result<Vec<f32>, AppError> {
        unreachable!("embed_chunk should not be called after extraction failure")
    }
}

async fn setup_db() -> SurrealDbClient {
    let namespace = "pipeline_test";
    let database = Uuid::new_v4().to_string();
    let db = SurrealDbClient::memory(namespace, &database)
        .await
        .expect("Failed to create in-memory SurrealDB");
    db.ensure_initialized(TEST_EMBEDDING_DIM)
        .await
        .expect("Failed to initialize schema");
    db
}

fn pipeline_config() -> IngestionConfig {
    IngestionConfig {
        tuning: IngestionTuning {
            max_chunk_chars: 64,
            overlap_chars: 16,
            embedding_concurrency: 2,
        },
    }
}

async fn stored_document(db: &SurrealDbClient, workspace_id: &str) -> Document {
    Document::create_and_add_to_db(
        workspace_id.to_string(),
        "notes.txt".to_string(),
        format!("{workspace_id}/notes.txt"),
        "text/plain".to_string(),
        512,
        db,
    )
    .await
    .expect("document created")
}

fn long_text() -> String {
    "Storage engines trade write amplification against read cost. "
        .repeat(6)
        .trim_end()
        .to_string()
}

#[tokio::test]
async fn ingestion_happy_path_indexes_all_chunks() {
    let db = setup_db().await;
    let document = stored_document(&db, "workspace-1").await;
    let services = Arc::new(MockServices::new(&long_text()));
    let pipeline = IngestionPipeline::with_services(
        Arc::new(db.clone()),
        pipeline_config(),
        services.clone(),
    );

    let outcome = pipeline
        .ingest(document.clone())
        .await
        .expect("pipeline succeeds");

    assert_eq!(outcome.document.status, DocumentStatus::Indexed);
    assert!(outcome.chunk_count > 1, "long text should produce several chunks");

    let stored = TextChunk::get_by_document_id(&document.id, &db)
        .await
        .expect("chunks stored");
    assert_eq!(stored.len(), outcome.chunk_count);

    let indexes: Vec<u32> = stored.iter().map(|c| c.chunk_index).collect();
    let expected: Vec<u32> = (0..stored.len() as u32).collect();
    assert_eq!(indexes, expected, "chunk order must match the source text");

    let call_log = services.calls.lock().await.clone();
    assert_eq!(call_log[0], "extract");
    assert!(call_log[1..].iter().all(|entry| *entry == "embed"));
}

#[tokio::test]
async fn embedding_failure_leaves_zero_searchable_chunks() {
    let db = setup_db().await;
    let document = stored_document(&db, "workspace-1").await;
    let services = Arc::new(MockServices::failing_on_embed_call(&long_text(), 2));
    let pipeline =
        IngestionPipeline::with_services(Arc::new(db.clone()), pipeline_config(), services);

    let result = pipeline.ingest(document.clone()).await;
    assert!(matches!(result, Err(AppError::Embedding(_))));

    let stored = Document::get_by_id(&document.id, &db)
        .await
        .expect("document still present");
    assert_eq!(stored.status, DocumentStatus::Failed);
    assert!(stored
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("Embedding"));

    let chunks = TextChunk::get_by_document_id(&document.id, &db)
        .await
        .expect("chunk query");
    assert!(chunks.is_empty(), "partial indexing must never be visible");

    let searchable = TextChunk::vector_search(5, vec![1.0, 0.0, 0.0], &db, "workspace-1", 0.0)
        .await
        .expect("search");
    assert!(searchable.is_empty());
}

#[tokio::test]
async fn extraction_failure_marks_document_failed() {
    let db = setup_db().await;
    let document = stored_document(&db, "workspace-1").await;
    let pipeline = IngestionPipeline::with_services(
        Arc::new(db.clone()),
        pipeline_config(),
        Arc::new(UnreadableDocumentServices),
    );

    let result = pipeline.ingest(document.clone()).await;
    assert!(matches!(result, Err(AppError::Extraction(_))));

    let stored = Document::get_by_id(&document.id, &db)
        .await
        .expect("document still present");
    assert_eq!(stored.status, DocumentStatus::Failed);
    assert!(stored
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("Extraction"));

    let chunks = TextChunk::get_by_document_id(&document.id, &db)
        .await
        .expect("chunk query");
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn whitespace_only_document_is_a_successful_noop() {
    let db = setup_db().await;
    let document = stored_document(&db, "workspace-1").await;
    let services = Arc::new(MockServices::new("  \n\t  "));
    let pipeline = IngestionPipeline::with_services(
        Arc::new(db.clone()),
        pipeline_config(),
        services.clone(),
    );

    let outcome = pipeline
        .ingest(document.clone())
        .await
        .expect("empty ingestion succeeds");

    assert_eq!(outcome.document.status, DocumentStatus::Indexed);
    assert_eq!(outcome.chunk_count, 0);

    let call_log = services.calls.lock().await.clone();
    assert_eq!(call_log, ["extract"], "no embedding call for zero chunks");

    let chunks = TextChunk::get_by_document_id(&document.id, &db)
        .await
        .expect("chunk query");
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn reingest_replaces_chunks_without_duplicates() {
    let db = setup_db().await;
    let document = stored_document(&db, "workspace-1").await;
    let services = Arc::new(MockServices::new(&long_text()));
    let pipeline = IngestionPipeline::with_services(
        Arc::new(db.clone()),
        pipeline_config(),
        services.clone(),
    );

    let first = pipeline
        .ingest(document.clone())
        .await
        .expect("first ingestion succeeds");

    let second = pipeline
        .reingest(first.document.clone())
        .await
        .expect("re-ingestion succeeds");

    assert_eq!(second.document.status, DocumentStatus::Indexed);
    assert_eq!(second.chunk_count, first.chunk_count);

    let stored = TextChunk::get_by_document_id(&document.id, &db)
        .await
        .expect("chunks stored");
    assert_eq!(
        stored.len(),
        first.chunk_count,
        "re-ingestion must not duplicate chunks"
    );
}
