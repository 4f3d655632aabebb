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
use tracing::error;

use crate::chunking::TextSpan;

use super::{config::IngestionConfig, services::PipelineServices};

pub struct PipelineContext<'a> {
    pub document: &'a Document,
    pub document_id: String,
    pub workspace_id: String,
    pub db: &'a SurrealDbClient,
    pub pipeline_config: &'a IngestionConfig,
    pub services: &'a dyn PipelineServices,
    pub extracted_text: Option<String>,
    pub spans: Vec<TextSpan>,
    pub embedded_chunks: Vec<TextChunk>,
    pub persisted_chunk_count: usize,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        document: &'a Document,
        db: &'a SurrealDbClient,
        pipeline_config: &'a IngestionConfig,
        services: &'a dyn PipelineServices,
    ) -> Self {
        let document_id = document.id.clone();
        let workspace_id = document.workspace_id.clone();
        Self {
            document,
            document_id,
            workspace_id,
            db,
            pipeline_config,
            services,
            extracted_text: None,
            spans: Vec::new(),
            embedded_chunks: Vec::new(),
            persisted_chunk_count: 0,
        }
    }

    pub fn extracted_text(&self) -> Result<&str, AppError> {
        self.extracted_text
            .as_deref()
            .ok_or_else(|| AppError::Internal("extracted text expected to be available".into()))
    }

    pub async fn set_status(&self, status: DocumentStatus) -> Result<(), AppError> {
        Document::set_status(&self.document_id, status, self.db).await?;
        Ok(())
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            document_id = %self.document_id,
            error = %err,
            "ingestion pipeline aborted"
        );
        err
    }
}
