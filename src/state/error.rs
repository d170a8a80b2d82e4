use thiserror::Error;

use crate::core::errors::ResearchError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] ResearchError),

    #[error("Failed to initialize search provider: {0}")]
    Search(#[source] ResearchError),

    #[error("Failed to initialize LLM backends: {0}")]
    Llm(#[source] ResearchError),
}
