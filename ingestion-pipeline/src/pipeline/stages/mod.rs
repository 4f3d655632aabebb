use common::{
    error::AppError,
    storage::types::{document::DocumentStatus, text_chunk::TextChunk},
};
use futures::{stream, StreamExt, TryStreamExt};
use state_machines::core::GuardError;
use tracing::{debug, instrument};

use crate::chunking::chunk_text;

use super::{
    context::PipelineContext,
    state::{Chunking, Embedding, Extracting, Indexed, IngestionMachine, Uploaded},
};

#[instrument(level = "trace", skip_all, fields(document_id = %ctx.document_id))]
pub async fn extract(
    machine: IngestionMachine<(), Uploaded>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Extracting>, AppError> {
    let machine = machine
        .start_extraction()
        .map_err(|(_, guard)| map_guard_error("start_extraction", &guard))?;
    ctx.set_status(DocumentStatus::Extracting).await?;

    let text = ctx.services.extract_text(ctx.document).await?;

    let text_chars = text.chars().count();
    let preview: String = text.chars().take(120).collect();
    let preview_clean = preview.replace('\n', " ");
    debug!(
        document_id = %ctx.document_id,
        text_chars,
        preview = %preview_clean,
        "document text extracted"
    );

    ctx.extracted_text = Some(text);

    Ok(machine)
}

#[instrument(level = "trace", skip_all, fields(document_id = %ctx.document_id))]
pub async fn chunk(
    machine: IngestionMachine<(), Extracting>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Chunking>, AppError> {
    let machine = machine
        .start_chunking()
        .map_err(|(_, guard)| map_guard_error("start_chunking", &guard))?;
    ctx.set_status(DocumentStatus::Chunking).await?;

    let tuning = &ctx.pipeline_config.tuning;
    let spans = chunk_text(
        ctx.extracted_text()?,
        tuning.max_chunk_chars,
        tuning.overlap_chars,
    )?;

    debug!(
        document_id = %ctx.document_id,
        chunk_count = spans.len(),
        "document text chunked"
    );

    ctx.spans = spans;

    Ok(machine)
}

#[instrument(level = "trace", skip_all, fields(document_id = %ctx.document_id))]
pub async fn embed(
    machine: IngestionMachine<(), Chunking>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Embedding>, AppError> {
    let machine = machine
        .start_embedding()
        .map_err(|(_, guard)| map_guard_error("start_embedding", &guard))?;
    ctx.set_status(DocumentStatus::Embedding).await?;

    let concurrency = ctx.pipeline_config.tuning.embedding_concurrency.max(1);
    let spans = std::mem::take(&mut ctx.spans);
    let services = ctx.services;

    // Completion order is unspecified under concurrency; every vector is
    // re-paired with its source span by index before anything is stored.
    let mut embedded: Vec<(usize, Vec<f32>)> =
        stream::iter(spans.iter().enumerate().map(|(index, span)| async move {
            let embedding = services.embed_chunk(&span.text).await?;
            Ok::<_, AppError>((index, embedding))
        }))
        .buffer_unordered(concurrency)
        .try_collect()
        .await?;
    embedded.sort_unstable_by_key(|(index, _)| *index);

    let mut chunks = Vec::with_capacity(spans.len());
    for (index, embedding) in embedded {
        let span = &spans[index];
        chunks.push(TextChunk::new(
            ctx.document_id.clone(),
            ctx.workspace_id.clone(),
            index as u32,
            span.text.clone(),
            embedding,
            span.start as u64,
            span.end as u64,
        ));
    }

    debug!(
        document_id = %ctx.document_id,
        chunk_count = chunks.len(),
        "chunk embeddings generated"
    );

    ctx.embedded_chunks = chunks;

    Ok(machine)
}

#[instrument(level = "trace", skip_all, fields(document_id = %ctx.document_id))]
pub async fn persist(
    machine: IngestionMachine<(), Embedding>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Indexed>, AppError> {
    let chunks = std::mem::take(&mut ctx.embedded_chunks);
    let chunk_count = chunks.len();

    TextChunk::insert_batch(chunks, ctx.db).await?;
    ctx.persisted_chunk_count = chunk_count;

    debug!(
        document_id = %ctx.document_id,
        chunk_count,
        "chunks flushed to database"
    );

    machine
        .finish()
        .map_err(|(_, guard)| map_guard_error("finish", &guard))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::Internal(format!(
        "invalid ingestion pipeline transition during {event}: {guard:?}"
    ))
}
