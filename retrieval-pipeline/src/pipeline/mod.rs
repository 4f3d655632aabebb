mod config;

pub use config::{RetrievalConfig, RetrievalTuning};

use std::time::{Duration, Instant};

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::text_chunk::TextChunk},
    utils::{
        embedding::{sanitize_for_embedding, EmbeddingProvider},
        generation::GenerationProvider,
    },
};
use tracing::{info, instrument};

use crate::{
    prompt::{build_context, build_user_message, NO_CONTEXT_ANSWER, QUERY_SYSTEM_PROMPT},
    RetrievalResult, RetrievedChunk,
};

/// Answers a question from the documents indexed in one workspace.
///
/// Embeds the question, searches the workspace's chunks, and conditions the
/// generative model on the retrieved context. When nothing clears the
/// similarity threshold the fixed no-context answer is returned and the
/// model is never called.
#[instrument(skip_all, fields(workspace_id = %workspace_id))]
pub async fn answer(
    db: &SurrealDbClient,
    embedding_provider: &EmbeddingProvider,
    generation_provider: &GenerationProvider,
    workspace_id: &str,
    question: &str,
    config: RetrievalConfig,
) -> Result<RetrievalResult, AppError> {
    let question_chars = question.chars().count();
    let preview: String = question.chars().take(120).collect();
    let preview_clean = preview.replace('\n', " ");
    info!(
        %workspace_id,
        question_chars,
        preview = %preview_clean,
        "Starting retrieval pipeline"
    );

    let stage_start = Instant::now();
    let query_embedding = embedding_provider
        .embed(&sanitize_for_embedding(question))
        .await?;
    let embed_duration = stage_start.elapsed();

    answer_with_embedding(
        db,
        generation_provider,
        workspace_id,
        question,
        query_embedding,
        embed_duration,
        config,
    )
    .await
}

/// Variant for callers that already hold the query embedding (tests, cached
/// queries). `answer` delegates here after embedding the question.
pub async fn answer_with_query_embedding(
    db: &SurrealDbClient,
    generation_provider: &GenerationProvider,
    workspace_id: &str,
    question: &str,
    query_embedding: Vec<f32>,
    config: RetrievalConfig,
) -> Result<RetrievalResult, AppError> {
    answer_with_embedding(
        db,
        generation_provider,
        workspace_id,
        question,
        query_embedding,
        Duration::ZERO,
        config,
    )
    .await
}

async fn answer_with_embedding(
    db: &SurrealDbClient,
    generation_provider: &GenerationProvider,
    workspace_id: &str,
    question: &str,
    query_embedding: Vec<f32>,
    embed_duration: Duration,
    config: RetrievalConfig,
) -> Result<RetrievalResult, AppError> {
    let pipeline_started = Instant::now();
    let tuning = config.tuning;

    let stage_start = Instant::now();
    let matches = TextChunk::vector_search(
        tuning.top_k,
        query_embedding,
        db,
        workspace_id,
        tuning.similarity_threshold,
    )
    .await?;
    let search_duration = stage_start.elapsed();

    if matches.is_empty() {
        info!(
            %workspace_id,
            threshold = tuning.similarity_threshold,
            "no chunks cleared the similarity threshold; skipping generation"
        );
        return Ok(RetrievalResult {
            answer: NO_CONTEXT_ANSWER.to_string(),
            chunks: Vec::new(),
        });
    }

    let context = build_context(&matches);
    let user_message = build_user_message(&context, question);

    let stage_start = Instant::now();
    let answer_text = generation_provider
        .generate(QUERY_SYSTEM_PROMPT, &user_message)
        .await?;
    let generate_duration = stage_start.elapsed();

    info!(
        %workspace_id,
        chunk_count = matches.len(),
        embed_ms = duration_millis(embed_duration),
        search_ms = duration_millis(search_duration),
        generate_ms = duration_millis(generate_duration),
        total_ms = duration_millis(pipeline_started.elapsed() + embed_duration),
        "retrieval pipeline finished"
    );

    Ok(RetrievalResult {
        answer: answer_text,
        chunks: matches
            .into_iter()
            .map(|entry| RetrievedChunk {
                chunk: entry.chunk,
                score: entry.similarity,
            })
            .collect(),
    })
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
