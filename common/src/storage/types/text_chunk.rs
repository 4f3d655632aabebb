use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

/// Search expansion factor for the HNSW index.
const KNN_EF: usize = 40;

stored_object!(TextChunk, "text_chunk", {
    document_id: String,
    workspace_id: String,
    chunk_index: u32,
    content: String,
    embedding: Vec<f32>,
    start_offset: u64,
    end_offset: u64
});

/// Row shape returned by the KNN query: chunk fields plus the raw cosine
/// distance computed by the index.
#[derive(Debug, Deserialize, Serialize)]
pub struct TextChunkSearchResult {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub created_at: DateTime<Utc>,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub updated_at: DateTime<Utc>,

    pub document_id: String,
    pub workspace_id: String,
    pub chunk_index: u32,
    pub content: String,
    pub embedding: Vec<f32>,
    pub start_offset: u64,
    pub end_offset: u64,

    pub distance: f32,
}

/// A chunk paired with its cosine similarity to the query vector.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub similarity: f32,
}

impl TextChunkSearchResult {
    fn into_scored(self) -> ScoredChunk {
        let similarity = similarity_from_distance(self.distance);
        ScoredChunk {
            chunk: TextChunk {
                id: self.id,
                created_at: self.created_at,
                updated_at: self.updated_at,
                document_id: self.document_id,
                workspace_id: self.workspace_id,
                chunk_index: self.chunk_index,
                content: self.content,
                embedding: self.embedding,
                start_offset: self.start_offset,
                end_offset: self.end_offset,
            },
            similarity,
        }
    }
}

/// The HNSW index reports cosine distance; searchers work with similarity.
fn similarity_from_distance(distance: f32) -> f32 {
    if !distance.is_finite() {
        return 0.0;
    }
    (1.0 - distance).clamp(-1.0, 1.0)
}

impl TextChunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document_id: String,
        workspace_id: String,
        chunk_index: u32,
        content: String,
        embedding: Vec<f32>,
        start_offset: u64,
        end_offset: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            document_id,
            workspace_id,
            chunk_index,
            content,
            embedding,
            start_offset,
            end_offset,
        }
    }

    /// Persists all chunks of one document in a single transaction: either
    /// every chunk becomes visible to search, or none does. A search running
    /// concurrently can never observe a partially-inserted document.
    pub async fn insert_batch(
        chunks: Vec<TextChunk>,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        if chunks.is_empty() {
            return Ok(());
        }

        const INSERT_CHUNKS: &str = r"
            BEGIN TRANSACTION;
            FOR $chunk IN $chunks {
                CREATE type::thing('text_chunk', $chunk.id) CONTENT {
                    document_id: $chunk.document_id,
                    workspace_id: $chunk.workspace_id,
                    chunk_index: $chunk.chunk_index,
                    content: $chunk.content,
                    embedding: $chunk.embedding,
                    start_offset: $chunk.start_offset,
                    end_offset: $chunk.end_offset,
                    created_at: $chunk.created_at,
                    updated_at: $chunk.updated_at
                };
            };
            COMMIT TRANSACTION;
        ";

        db.client
            .query(INSERT_CHUNKS)
            .bind(("chunks", chunks))
            .await?
            .check()?;

        Ok(())
    }

    /// Nearest-neighbour search restricted to one workspace.
    ///
    /// Returns up to `take` chunks whose cosine similarity to the query
    /// clears `similarity_threshold`, ordered by descending similarity with
    /// ties broken by insertion time then chunk index. Nothing clearing the
    /// threshold yields an empty vec, not an error.
    pub async fn vector_search(
        take: usize,
        query_embedding: Vec<f32>,
        db: &SurrealDbClient,
        workspace_id: &str,
        similarity_threshold: f32,
    ) -> Result<Vec<ScoredChunk>, AppError> {
        let closest_query = format!(
            "SELECT *, vector::distance::knn() AS distance FROM {table}
             WHERE workspace_id = $workspace_id AND embedding <|{take},{KNN_EF}|> $embedding
             ORDER BY distance ASC, created_at ASC, chunk_index ASC",
            table = Self::table_name(),
        );

        let rows: Vec<TextChunkSearchResult> = db
            .client
            .query(closest_query)
            .bind(("workspace_id", workspace_id.to_owned()))
            .bind(("embedding", query_embedding))
            .await?
            .take(0)?;

        let scored = rows
            .into_iter()
            .map(TextChunkSearchResult::into_scored)
            .filter(|entry| entry.similarity >= similarity_threshold)
            .take(take)
            .collect();

        Ok(scored)
    }

    pub async fn get_by_document_id(
        document_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<TextChunk>, AppError> {
        let chunks: Vec<TextChunk> = db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE document_id = $document_id
                 ORDER BY chunk_index ASC",
            )
            .bind(("table", Self::table_name()))
            .bind(("document_id", document_id.to_owned()))
            .await?
            .take(0)?;

        Ok(chunks)
    }

    pub async fn delete_by_document_id(
        document_id: &str,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        db.client
            .query("DELETE type::table($table) WHERE document_id = $document_id")
            .bind(("table", Self::table_name()))
            .bind(("document_id", document_id.to_owned()))
            .await?
            .check()?;

        Ok(())
    }
}
