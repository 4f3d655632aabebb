use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{store::StorageManager, types::document::Document},
    utils::embedding::{sanitize_for_embedding, EmbeddingProvider},
};

use crate::utils::text_extraction::extract_text;

/// External collaborators the pipeline depends on, behind one trait so tests
/// can substitute failing or scripted implementations.
#[async_trait]
pub trait PipelineServices: Send + Sync {
    async fn extract_text(&self, document: &Document) -> Result<String, AppError>;

    async fn embed_chunk(&self, text: &str) -> Result<Vec<f32>, AppError>;
}

pub struct DefaultPipelineServices {
    storage: StorageManager,
    embedding_provider: Arc<EmbeddingProvider>,
}

impl DefaultPipelineServices {
    pub fn new(storage: StorageManager, embedding_provider: Arc<EmbeddingProvider>) -> Self {
        Self {
            storage,
            embedding_provider,
        }
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn extract_text(&self, document: &Document) -> Result<String, AppError> {
        let bytes = self.storage.get(&document.storage_path).await?;
        extract_text(&document.mime_type, bytes).await
    }

    async fn embed_chunk(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let embedding = self
            .embedding_provider
            .embed(&sanitize_for_embedding(text))
            .await?;

        if embedding.len() != self.embedding_provider.dimension() {
            return Err(AppError::Embedding(format!(
                "embedding for chunk has dimension {}, expected {}",
                embedding.len(),
                self.embedding_provider.dimension()
            )));
        }

        Ok(embedding)
    }
}
