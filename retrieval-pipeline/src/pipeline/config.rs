/// Tunable parameters that govern each retrieval stage.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalTuning {
    /// Maximum number of chunks handed to the generative model.
    pub top_k: usize,
    /// Cosine similarity floor; chunks below it never reach the model, so an
    /// empty knowledge base yields the fixed no-context answer instead of
    /// hallucinated output.
    pub similarity_threshold: f32,
}

impl Default for RetrievalTuning {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.5,
        }
    }
}

/// Wrapper containing tuning plus future flags for per-request overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalConfig {
    pub tuning: RetrievalTuning,
}

impl RetrievalConfig {
    pub fn with_tuning(tuning: RetrievalTuning) -> Self {
        Self { tuning }
    }
}
