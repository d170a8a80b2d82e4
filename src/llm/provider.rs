use async_trait::async_trait;

use crate::core::errors::ResearchError;

/// Text embedding backend. Vectors of one model share a fixed dimension.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// identifier of the embedding model (recorded by the index)
    fn model_id(&self) -> &str;

    /// embed a batch of texts, one vector per input, in input order
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ResearchError>;
}

/// Text generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_id(&self) -> &str;

    /// prompt + output limit in tokens
    fn context_window(&self) -> usize;

    /// make the model ready; fails with `ModelLoad`
    async fn load(&self) -> Result<(), ResearchError>;

    /// completion capped at `max_new_tokens` output tokens
    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String, ResearchError>;
}
