#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod pipeline;
pub mod prompt;

use common::storage::types::text_chunk::TextChunk;

pub use pipeline::{answer, answer_with_query_embedding, RetrievalConfig, RetrievalTuning};

// Captures a supporting chunk plus its similarity score for citations.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

/// What one question produces: the generated answer plus the chunks it was
/// grounded on, in the order they were handed to the model.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub answer: String,
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    /// Citation payload for UI/debugging callers.
    pub fn to_citation_json(&self) -> serde_json::Value {
        serde_json::json!(self
            .chunks
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "id": entry.chunk.id,
                    "document_id": entry.chunk.document_id,
                    "content": entry.chunk.content,
                    "score": round_score(entry.score),
                })
            })
            .collect::<Vec<_>>())
    }
}

fn round_score(value: f32) -> f64 {
    (f64::from(value) * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{
        storage::db::SurrealDbClient,
        utils::generation::GenerationProvider,
    };
    use prompt::NO_CONTEXT_ANSWER;
    use uuid::Uuid;

    fn query_embedding() -> Vec<f32> {
        vec![1.0, 0.0, 0.0]
    }

    fn chunk_embedding_aligned() -> Vec<f32> {
        vec![0.9, 0.1, 0.0]
    }

    fn chunk_embedding_oblique() -> Vec<f32> {
        vec![0.6, 0.8, 0.0]
    }

    fn chunk_embedding_orthogonal() -> Vec<f32> {
        vec![0.0, 1.0, 0.0]
    }

    async fn setup_test_db() -> SurrealDbClient {
        let namespace = "test_ns";
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, &database)
            .await
            .expect("Failed to start in-memory surrealdb");

        db.ensure_initialized(3)
            .await
            .expect("Failed to configure indices");

        db
    }

    async fn seed_chunk(
        db: &SurrealDbClient,
        workspace_id: &str,
        index: u32,
        content: &str,
        embedding: Vec<f32>,
    ) {
        let chunk = TextChunk::new(
            "doc-1".to_string(),
            workspace_id.to_string(),
            index,
            content.to_string(),
            embedding,
            0,
            content.chars().count() as u64,
        );
        TextChunk::insert_batch(vec![chunk], db)
            .await
            .expect("Failed to seed chunk");
    }

    #[tokio::test]
    async fn test_empty_workspace_returns_fixed_answer_without_generation() {
        let db = setup_test_db().await;
        let generation = GenerationProvider::new_fixed("should never be used");

        let result = answer_with_query_embedding(
            &db,
            &generation,
            "empty-workspace",
            "is anything indexed?",
            query_embedding(),
            RetrievalConfig::default(),
        )
        .await
        .expect("retrieval should succeed");

        assert_eq!(result.answer, NO_CONTEXT_ANSWER);
        assert!(result.chunks.is_empty());
        assert_eq!(
            generation.invocation_count(),
            0,
            "generative model must not run on empty context"
        );
    }

    #[tokio::test]
    async fn test_threshold_filters_irrelevant_chunks() {
        let db = setup_test_db().await;
        let workspace = "ws-threshold";
        seed_chunk(
            &db,
            workspace,
            0,
            "Tokio uses cooperative scheduling for fairness.",
            chunk_embedding_aligned(),
        )
        .await;
        seed_chunk(
            &db,
            workspace,
            1,
            "Unrelated trivia about medieval agriculture.",
            chunk_embedding_orthogonal(),
        )
        .await;

        let generation = GenerationProvider::new_fixed("grounded answer");
        let result = answer_with_query_embedding(
            &db,
            &generation,
            workspace,
            "how does tokio schedule tasks?",
            query_embedding(),
            RetrievalConfig::default(),
        )
        .await
        .expect("retrieval should succeed");

        assert_eq!(result.answer, "grounded answer");
        assert_eq!(result.chunks.len(), 1);
        assert!(result.chunks[0].chunk.content.contains("Tokio"));
        assert!(result.chunks[0].score >= 0.5);
        assert_eq!(generation.invocation_count(), 1);
    }

    #[tokio::test]
    async fn test_context_contains_chunks_in_ranked_order() {
        let db = setup_test_db().await;
        let workspace = "ws-ranked";
        seed_chunk(
            &db,
            workspace,
            0,
            "Second-best passage about runtimes.",
            chunk_embedding_oblique(),
        )
        .await;
        seed_chunk(
            &db,
            workspace,
            1,
            "Best passage about runtimes.",
            chunk_embedding_aligned(),
        )
        .await;

        let generation = GenerationProvider::new_fixed("grounded answer");
        let result = answer_with_query_embedding(
            &db,
            &generation,
            workspace,
            "tell me about runtimes",
            query_embedding(),
            RetrievalConfig::default(),
        )
        .await
        .expect("retrieval should succeed");

        assert_eq!(result.chunks.len(), 2);
        assert_eq!(result.chunks[0].chunk.content, "Best passage about runtimes.");

        let prompt_seen = generation.last_prompt().expect("prompt recorded");
        let best_at = prompt_seen
            .find("Best passage about runtimes.")
            .expect("best chunk in context");
        let second_at = prompt_seen
            .find("Second-best passage about runtimes.")
            .expect("second chunk in context");
        assert!(best_at < second_at, "context must preserve ranking order");
        assert!(prompt_seen.contains("tell me about runtimes"));
    }

    #[tokio::test]
    async fn test_retrieval_never_crosses_workspaces() {
        let db = setup_test_db().await;
        seed_chunk(
            &db,
            "workspace-a",
            0,
            "Visible to workspace A only.",
            chunk_embedding_aligned(),
        )
        .await;
        seed_chunk(
            &db,
            "workspace-b",
            0,
            "Visible to workspace B only.",
            chunk_embedding_aligned(),
        )
        .await;

        let generation = GenerationProvider::new_fixed("grounded answer");
        let result = answer_with_query_embedding(
            &db,
            &generation,
            "workspace-a",
            "what can I see?",
            query_embedding(),
            RetrievalConfig::default(),
        )
        .await
        .expect("retrieval should succeed");

        assert_eq!(result.chunks.len(), 1);
        assert!(result.chunks[0].chunk.content.contains("workspace A"));

        let prompt_seen = generation.last_prompt().expect("prompt recorded");
        assert!(!prompt_seen.contains("workspace B"));
    }

    #[tokio::test]
    async fn test_top_k_caps_the_context() {
        let db = setup_test_db().await;
        let workspace = "ws-capped";
        for index in 0..4u32 {
            seed_chunk(
                &db,
                workspace,
                index,
                &format!("Passage number {index}."),
                chunk_embedding_aligned(),
            )
            .await;
        }

        let generation = GenerationProvider::new_fixed("grounded answer");
        let config = RetrievalConfig::with_tuning(RetrievalTuning {
            top_k: 2,
            similarity_threshold: 0.5,
        });
        let result = answer_with_query_embedding(
            &db,
            &generation,
            workspace,
            "how many passages?",
            query_embedding(),
            config,
        )
        .await
        .expect("retrieval should succeed");

        assert_eq!(result.chunks.len(), 2);
    }

    #[test]
    fn test_citation_json_shape() {
        let result = RetrievalResult {
            answer: "an answer".to_string(),
            chunks: vec![RetrievedChunk {
                chunk: TextChunk::new(
                    "doc-9".to_string(),
                    "ws".to_string(),
                    0,
                    "cited content".to_string(),
                    vec![0.0; 3],
                    0,
                    13,
                ),
                score: 0.8765,
            }],
        };

        let json = result.to_citation_json();
        assert_eq!(json[0]["document_id"], "doc-9");
        assert_eq!(json[0]["content"], "cited content");
        assert_eq!(json[0]["score"], 0.877);
    }
}
