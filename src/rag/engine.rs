//! RAG orchestrator: composes the vector index with a generation backend
//! behind one query contract.
//!
//! - `build_index` embeds texts and replaces any previous index wholesale.
//! - `load_model` readies the generator once.
//! - `query` retrieves top-k context and produces a bounded answer.
//!
//! Embedding and generation failures for a single question are reported in
//! its `QueryResult` (answer prefixed with `ERROR_MARKER`); structural faults
//! such as `EmptyIndex` and `ModelLoad` are returned as errors.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use super::context_builder::{RagContextBuilder, RetrievedDocument};
use super::index::{Metadata, VectorIndex};
use crate::core::errors::ResearchError;
use crate::llm::prompt::rag_prompt;
use crate::llm::{Embedder, Generator, LlmService};
use crate::research::SearchRecord;

/// Prefix of the answer of a question that could not be answered.
pub const ERROR_MARKER: &str = "[rag-error]";

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub question: String,
    pub answer: String,
    /// At most `k` entries, highest similarity first.
    pub retrieved: Vec<RetrievedDocument>,
    /// Retrieved entries that fit into the generation context.
    pub context_used: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    pub fn failed(question: &str, err: &ResearchError) -> Self {
        Self {
            question: question.to_string(),
            answer: format!("{} {}", ERROR_MARKER, err),
            retrieved: Vec::new(),
            context_used: 0,
            error: Some(err.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

pub struct RagOrchestrator {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    context: RagContextBuilder,
    index: Option<VectorIndex>,
    model_ready: OnceCell<()>,
}

impl RagOrchestrator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        context: RagContextBuilder,
    ) -> Self {
        Self {
            embedder,
            generator,
            context,
            index: None,
            model_ready: OnceCell::new(),
        }
    }

    pub fn from_service(service: &LlmService, include_citations: bool) -> Self {
        Self::new(
            service.embedder.clone(),
            service.generator.clone(),
            RagContextBuilder::new(include_citations, service.counter.clone()),
        )
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    pub fn ntotal(&self) -> usize {
        self.index.as_ref().map(VectorIndex::ntotal).unwrap_or(0)
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model_ready.initialized()
    }

    /// Embed `texts` and replace the current index. On any error the previous
    /// index stays in place.
    pub async fn build_index(
        &mut self,
        texts: Vec<String>,
        metadata: Vec<Metadata>,
    ) -> Result<(), ResearchError> {
        if texts.len() != metadata.len() {
            return Err(ResearchError::DimensionMismatch {
                texts: texts.len(),
                metadata: metadata.len(),
            });
        }

        let embeddings = self.embedder.embed(&texts).await?;
        let index = VectorIndex::build(self.embedder.model_id(), texts, metadata, embeddings)?;

        tracing::info!(
            "Built vector index: {} entries, dimension {}, model '{}'",
            index.ntotal(),
            index.dimension(),
            index.embedding_model()
        );
        self.index = Some(index);
        Ok(())
    }

    pub async fn build_index_from_records(
        &mut self,
        records: &[SearchRecord],
    ) -> Result<(), ResearchError> {
        let mut texts = Vec::with_capacity(records.len());
        let mut metadata = Vec::with_capacity(records.len());
        for record in records {
            let value = serde_json::to_value(&record.metadata).map_err(ResearchError::internal)?;
            texts.push(record.text.clone());
            metadata.push(value.as_object().cloned().unwrap_or_default());
        }
        self.build_index(texts, metadata).await
    }

    /// Use an index built elsewhere; it must come from this embedding model.
    pub fn install_index(&mut self, index: VectorIndex) -> Result<(), ResearchError> {
        if index.embedding_model() != self.embedder.model_id() {
            return Err(ResearchError::EmbeddingModelMismatch {
                index: index.embedding_model().to_string(),
                query: self.embedder.model_id().to_string(),
            });
        }
        self.index = Some(index);
        Ok(())
    }

    /// Ready the generation model. Repeated calls after a success are no-ops;
    /// a failed load may be retried.
    pub async fn load_model(&self) -> Result<(), ResearchError> {
        self.model_ready
            .get_or_try_init(|| async {
                tracing::info!("Loading generation model '{}'", self.generator.model_id());
                self.generator.load().await.map_err(|err| match err {
                    ResearchError::ModelLoad(_) => err,
                    other => ResearchError::ModelLoad(other.to_string()),
                })
            })
            .await
            .map(|_| ())
    }

    pub async fn query(
        &self,
        question: &str,
        k: usize,
        max_new_tokens: u32,
    ) -> Result<QueryResult, ResearchError> {
        if k == 0 || max_new_tokens == 0 {
            return Err(ResearchError::BadRequest(
                "k and max_new_tokens must be positive".to_string(),
            ));
        }
        let index = match &self.index {
            Some(index) if !index.is_empty() => index,
            _ => return Err(ResearchError::EmptyIndex),
        };
        if index.embedding_model() != self.embedder.model_id() {
            return Err(ResearchError::EmbeddingModelMismatch {
                index: index.embedding_model().to_string(),
                query: self.embedder.model_id().to_string(),
            });
        }
        self.load_model().await?;

        match self.answer(index, question, k, max_new_tokens).await {
            Ok(result) => Ok(result),
            Err(err) => {
                tracing::warn!("Question '{}' failed: {}", question, err);
                Ok(QueryResult::failed(question, &err))
            }
        }
    }

    async fn answer(
        &self,
        index: &VectorIndex,
        question: &str,
        k: usize,
        max_new_tokens: u32,
    ) -> Result<QueryResult, ResearchError> {
        let query_vector = self
            .embedder
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ResearchError::Embedding("no vector for question".to_string()))?;

        let retrieved: Vec<RetrievedDocument> = index
            .search(&query_vector, k)?
            .into_iter()
            .filter_map(|(id, score)| {
                index.document(id).map(|doc| RetrievedDocument {
                    id,
                    text: doc.text.clone(),
                    metadata: doc.metadata.clone(),
                    score,
                })
            })
            .collect();

        let counter = self.context.counter();
        let overhead = counter.count(&rag_prompt(question, ""));
        let budget = self
            .generator
            .context_window()
            .saturating_sub(max_new_tokens as usize)
            .saturating_sub(overhead);
        let context = self.context.build_context(&retrieved, budget);
        if context.entries_used == 0 {
            return Err(ResearchError::Generation(format!(
                "max_new_tokens {} leaves no room for context in a {}-token window",
                max_new_tokens,
                self.generator.context_window()
            )));
        }
        if context.truncated {
            tracing::debug!(
                "Context for '{}' cut to {} of {} entries ({} tokens)",
                question,
                context.entries_used,
                retrieved.len(),
                budget
            );
        }

        let prompt = rag_prompt(question, &context.text);
        let answer = self.generator.generate(&prompt, max_new_tokens).await?;

        Ok(QueryResult {
            question: question.to_string(),
            answer,
            retrieved,
            context_used: context.entries_used,
            error: None,
        })
    }

    /// Answer each question in order. Every question yields a result; any
    /// failure is reported inline.
    pub async fn answer_questions(
        &self,
        questions: &[String],
        k: usize,
        max_new_tokens: u32,
    ) -> Vec<QueryResult> {
        let mut results = Vec::with_capacity(questions.len());
        for question in questions {
            let result = match self.query(question, k, max_new_tokens).await {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!("Question '{}' failed: {}", question, err);
                    QueryResult::failed(question, &err)
                }
            };
            results.push(result);
        }
        results
    }
}
