use common::storage::types::text_chunk::ScoredChunk;

/// System role for answer generation. The model must stay inside the
/// supplied context and fall back to a fixed phrase when it cannot.
pub const QUERY_SYSTEM_PROMPT: &str = "You are a helpful AI assistant for a specific workspace. \
Use the following pieces of context to answer the user's question. \
If the answer is not in the context, say \"I don't have that information in the uploaded documents.\"";

/// Returned without invoking the generative model when no chunk clears the
/// similarity threshold.
pub const NO_CONTEXT_ANSWER: &str =
    "I couldn't find any relevant information in your documents.";

/// Concatenates retrieved chunk texts in ranked order, separated by a
/// paragraph break.
pub fn build_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|entry| entry.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_user_message(context: &str, question: &str) -> String {
    format!(
        r"
        Context:
        ==================
        {context}

        Question:
        ==================
        {question}
        "
    )
}
