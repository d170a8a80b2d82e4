use std::sync::Arc;

use super::extractive::ExtractiveGenerator;
use super::hashing::HashingEmbedder;
use super::openai::OpenAiCompatibleClient;
use super::provider::{Embedder, Generator};
use super::tokens::TokenCounter;
use crate::core::config::settings::{EmbeddingBackend, GenerationBackend, Settings};
use crate::core::errors::ResearchError;

/// Embedding and generation backends selected by configuration.
#[derive(Clone)]
pub struct LlmService {
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub counter: TokenCounter,
}

impl LlmService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        counter: TokenCounter,
    ) -> Self {
        Self {
            embedder,
            generator,
            counter,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ResearchError> {
        let counter = TokenCounter::from_settings(&settings.rag);

        let embedder: Arc<dyn Embedder> = match settings.embedding.backend {
            EmbeddingBackend::Hashing => {
                Arc::new(HashingEmbedder::new(settings.embedding.dimension)?)
            }
            EmbeddingBackend::OpenAi => {
                Arc::new(OpenAiCompatibleClient::for_embeddings(&settings.embedding)?)
            }
        };

        let generator: Arc<dyn Generator> = match settings.generation.backend {
            GenerationBackend::Extractive => Arc::new(ExtractiveGenerator::new(
                counter.clone(),
                settings.generation.context_window,
            )),
            GenerationBackend::OpenAi => {
                Arc::new(OpenAiCompatibleClient::for_generation(&settings.generation)?)
            }
        };

        tracing::info!(
            "LLM backends: embedding='{}', generation='{}', exact token counts={}",
            embedder.model_id(),
            generator.model_id(),
            counter.is_exact()
        );

        Ok(Self::new(embedder, generator, counter))
    }
}
