mod config;
mod context;
mod services;
mod stages;
mod state;

pub use config::{IngestionConfig, IngestionTuning};
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultPipelineServices, PipelineServices};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::{document::Document, text_chunk::TextChunk},
    },
    utils::embedding::EmbeddingProvider,
};
use tracing::{error, info};

use self::{
    context::PipelineContext,
    stages::{chunk, embed, extract, persist},
    state::uploaded,
};

/// Result of a completed ingestion: the indexed document plus how many
/// fragments it contributed to the search index.
#[derive(Debug, Clone)]
pub struct IngestionOutcome {
    pub document: Document,
    pub chunk_count: usize,
}

#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    pipeline_config: IngestionConfig,
    services: Arc<dyn PipelineServices>,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        storage: StorageManager,
        embedding_provider: Arc<EmbeddingProvider>,
    ) -> Self {
        Self::new_with_config(db, storage, embedding_provider, IngestionConfig::default())
    }

    pub fn new_with_config(
        db: Arc<SurrealDbClient>,
        storage: StorageManager,
        embedding_provider: Arc<EmbeddingProvider>,
        pipeline_config: IngestionConfig,
    ) -> Self {
        let services = DefaultPipelineServices::new(storage, embedding_provider);
        Self::with_services(db, pipeline_config, Arc::new(services))
    }

    pub fn with_services(
        db: Arc<SurrealDbClient>,
        pipeline_config: IngestionConfig,
        services: Arc<dyn PipelineServices>,
    ) -> Self {
        Self {
            db,
            pipeline_config,
            services,
        }
    }

    /// Runs one document through extract → chunk → embed → persist.
    ///
    /// On success the document is marked `Indexed`. On any failure it is
    /// marked `Failed` with the consolidated cause attached, the row is
    /// retained, and no chunks are visible to search.
    #[tracing::instrument(
        skip_all,
        fields(
            document_id = %document.id,
            workspace_id = %document.workspace_id,
            mime_type = %document.mime_type
        )
    )]
    pub async fn ingest(&self, document: Document) -> Result<IngestionOutcome, AppError> {
        match self.drive_pipeline(&document).await {
            Ok(chunk_count) => {
                let document = Document::mark_indexed(&document.id, &self.db).await?;
                info!(
                    document_id = %document.id,
                    chunk_count,
                    "document indexed"
                );
                Ok(IngestionOutcome {
                    document,
                    chunk_count,
                })
            }
            Err(err) => {
                let reason = err.to_string();
                if let Err(update_err) =
                    Document::mark_failed(&document.id, &reason, &self.db).await
                {
                    error!(
                        document_id = %document.id,
                        error = %update_err,
                        "failed to record ingestion failure"
                    );
                }
                Err(err)
            }
        }
    }

    /// Drops a document's existing chunks and runs ingestion again from the
    /// stored blob.
    pub async fn reingest(&self, document: Document) -> Result<IngestionOutcome, AppError> {
        TextChunk::delete_by_document_id(&document.id, &self.db).await?;
        let document = Document::reset_for_reingestion(&document.id, &self.db).await?;
        self.ingest(document).await
    }

    async fn drive_pipeline(&self, document: &Document) -> Result<usize, AppError> {
        let mut ctx = PipelineContext::new(
            document,
            self.db.as_ref(),
            &self.pipeline_config,
            self.services.as_ref(),
        );

        let machine = uploaded();

        let pipeline_started = Instant::now();

        let stage_start = Instant::now();
        let machine = extract(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let extract_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = chunk(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let chunk_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = embed(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let embed_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let _machine = persist(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let persist_duration = stage_start.elapsed();

        let total_duration = pipeline_started.elapsed();
        info!(
            document_id = %ctx.document_id,
            total_ms = Self::duration_millis(total_duration),
            extract_ms = Self::duration_millis(extract_duration),
            chunk_ms = Self::duration_millis(chunk_duration),
            embed_ms = Self::duration_millis(embed_duration),
            persist_ms = Self::duration_millis(persist_duration),
            "ingestion pipeline finished"
        );

        Ok(ctx.persisted_chunk_count)
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests;
