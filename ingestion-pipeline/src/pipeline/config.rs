use crate::chunking::{DEFAULT_MAX_CHUNK_CHARS, DEFAULT_OVERLAP_CHARS};

#[derive(Debug, Clone)]
pub struct IngestionTuning {
    /// Upper bound on chunk size, in characters.
    pub max_chunk_chars: usize,
    /// Characters shared between adjacent chunks. Must stay below
    /// `max_chunk_chars`.
    pub overlap_chars: usize,
    /// Concurrent embedding calls per document; bounded to respect the
    /// embedding provider's rate limits.
    pub embedding_concurrency: usize,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
            embedding_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
}
