use surrealdb::sql::Datetime as SurrealDatetime;
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, store::StorageManager},
    stored_object,
};

use super::text_chunk::TextChunk;

#[derive(Debug, Default, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum DocumentStatus {
    #[serde(rename = "Pending")]
    #[default]
    Pending,
    #[serde(rename = "Extracting")]
    Extracting,
    #[serde(rename = "Chunking")]
    Chunking,
    #[serde(rename = "Embedding")]
    Embedding,
    #[serde(rename = "Indexed")]
    Indexed,
    #[serde(rename = "Failed")]
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "Pending",
            DocumentStatus::Extracting => "Extracting",
            DocumentStatus::Chunking => "Chunking",
            DocumentStatus::Embedding => "Embedding",
            DocumentStatus::Indexed => "Indexed",
            DocumentStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Indexed | DocumentStatus::Failed)
    }

    /// A document only counts as searchable once ingestion committed its
    /// chunks. Failed documents stay visible but never searchable.
    pub fn is_searchable(&self) -> bool {
        matches!(self, DocumentStatus::Indexed)
    }
}

stored_object!(Document, "document", {
    workspace_id: String,
    file_name: String,
    storage_path: String,
    mime_type: String,
    size_bytes: u64,
    status: DocumentStatus,
    error_message: Option<String>
});

impl Document {
    pub fn new(
        workspace_id: String,
        file_name: String,
        storage_path: String,
        mime_type: String,
        size_bytes: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            workspace_id,
            file_name,
            storage_path,
            mime_type,
            size_bytes,
            status: DocumentStatus::Pending,
            error_message: None,
        }
    }

    pub async fn create_and_add_to_db(
        workspace_id: String,
        file_name: String,
        storage_path: String,
        mime_type: String,
        size_bytes: u64,
        db: &SurrealDbClient,
    ) -> Result<Document, AppError> {
        let document = Self::new(workspace_id, file_name, storage_path, mime_type, size_bytes);
        db.store_item(document.clone()).await?;
        Ok(document)
    }

    pub async fn get_by_id(id: &str, db: &SurrealDbClient) -> Result<Document, AppError> {
        db.get_item::<Document>(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {id} was not found")))
    }

    pub async fn list_by_workspace(
        workspace_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Document>, AppError> {
        let documents: Vec<Document> = db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE workspace_id = $workspace_id
                 ORDER BY created_at ASC",
            )
            .bind(("table", Self::table_name()))
            .bind(("workspace_id", workspace_id.to_owned()))
            .await?
            .take(0)?;

        Ok(documents)
    }

    /// Advances the persisted ingestion status. Terminal documents are
    /// immutable; re-ingestion must go through [`Self::reset_for_reingestion`].
    pub async fn set_status(
        id: &str,
        status: DocumentStatus,
        db: &SurrealDbClient,
    ) -> Result<Document, AppError> {
        const SET_STATUS_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $status,
                updated_at = $now
            WHERE status NOT IN $terminal_states
            RETURN AFTER;
        "#;

        let now = Utc::now();
        let mut result = db
            .client
            .query(SET_STATUS_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_owned()))
            .bind(("status", status.as_str()))
            .bind((
                "terminal_states",
                vec![
                    DocumentStatus::Indexed.as_str(),
                    DocumentStatus::Failed.as_str(),
                ],
            ))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let updated: Option<Document> = result.take(0)?;
        updated.ok_or_else(|| {
            AppError::Validation(format!(
                "Cannot move document {id} to {}: missing or already terminal",
                status.as_str()
            ))
        })
    }

    /// Marks ingestion as complete; the document becomes searchable.
    pub async fn mark_indexed(id: &str, db: &SurrealDbClient) -> Result<Document, AppError> {
        const MARK_INDEXED_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $indexed,
                error_message = NONE,
                updated_at = $now
            RETURN AFTER;
        "#;

        let now = Utc::now();
        let mut result = db
            .client
            .query(MARK_INDEXED_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_owned()))
            .bind(("indexed", DocumentStatus::Indexed.as_str()))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let updated: Option<Document> = result.take(0)?;
        updated.ok_or_else(|| AppError::NotFound(format!("Document {id} was not found")))
    }

    /// Records a failed ingestion. The row is retained so the failure is
    /// visible and retryable, with the cause attached for diagnostics.
    pub async fn mark_failed(
        id: &str,
        reason: &str,
        db: &SurrealDbClient,
    ) -> Result<Document, AppError> {
        const MARK_FAILED_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $failed,
                error_message = $reason,
                updated_at = $now
            RETURN AFTER;
        "#;

        let now = Utc::now();
        let mut result = db
            .client
            .query(MARK_FAILED_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_owned()))
            .bind(("failed", DocumentStatus::Failed.as_str()))
            .bind(("reason", reason.to_owned()))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let updated: Option<Document> = result.take(0)?;
        updated.ok_or_else(|| AppError::NotFound(format!("Document {id} was not found")))
    }

    /// Returns a terminal document to `Pending` so the pipeline can run it
    /// again. The caller is responsible for deleting stale chunks first.
    pub async fn reset_for_reingestion(
        id: &str,
        db: &SurrealDbClient,
    ) -> Result<Document, AppError> {
        const RESET_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $pending,
                error_message = NONE,
                updated_at = $now
            RETURN AFTER;
        "#;

        let now = Utc::now();
        let mut result = db
            .client
            .query(RESET_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_owned()))
            .bind(("pending", DocumentStatus::Pending.as_str()))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let updated: Option<Document> = result.take(0)?;
        updated.ok_or_else(|| AppError::NotFound(format!("Document {id} was not found")))
    }

    /// Removes the document, its chunks, and the uploaded blob.
    ///
    /// Chunks go first so a concurrent search cannot surface fragments of a
    /// document whose metadata is already gone.
    pub async fn delete(
        id: &str,
        db: &SurrealDbClient,
        storage: &StorageManager,
    ) -> Result<(), AppError> {
        let document = Self::get_by_id(id, db).await?;

        TextChunk::delete_by_document_id(&document.id, db).await?;
        storage.delete(&document.storage_path).await?;
        db.delete_item::<Document>(&document.id).await?;

        Ok(())
    }
}
