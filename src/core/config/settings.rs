//! Typed view over the merged YAML configuration.
//!
//! Every field has a default so an empty document yields a runnable,
//! fully offline setup (hashing embedder + extractive generator).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ResearchError;

/// Hard ceiling on search calls a single `research()` may plan.
pub const MAX_CALLS_PER_RESEARCH: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchSettings,
    pub credits: CreditSettings,
    pub spider: SpiderSettings,
    pub rag: RagSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub domains: BTreeMap<String, DomainEntry>,
    pub default_domain: Option<String>,
}

impl Settings {
    pub fn from_value(value: &Value) -> Result<Self, ResearchError> {
        serde_json::from_value(value.clone())
            .map_err(|e| ResearchError::BadRequest(format!("Invalid config: {}", e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub api_key: String,
    pub engine: String,
    pub base_url: String,
    pub results_per_call: u32,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            engine: "google".to_string(),
            base_url: "https://serpapi.com".to_string(),
            results_per_call: 10,
            requests_per_second: 2,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditSettings {
    pub credits_per_call: u64,
}

impl Default for CreditSettings {
    fn default() -> Self {
        Self {
            credits_per_call: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiderSettings {
    /// Keyword follow-ups issued after the primary call.
    pub max_follow_up_queries: usize,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub near_duplicate_threshold: f32,
}

impl Default for SpiderSettings {
    fn default() -> Self {
        Self {
            max_follow_up_queries: 2,
            max_retries: 2,
            backoff_base_ms: 250,
            near_duplicate_threshold: crate::research::dedup::NEAR_DUPLICATE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub top_k: usize,
    pub max_new_tokens: u32,
    pub include_citations: bool,
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_new_tokens: 256,
            include_citations: true,
            tokenizer_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    Hashing,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub dimension: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hashing,
            model: "text-embedding-nomic-embed-text-v1.5".to_string(),
            base_url: "http://localhost:1234".to_string(),
            api_key: None,
            dimension: 384,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationBackend {
    Extractive,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub backend: GenerationBackend,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Model input limit in tokens (prompt + output).
    pub context_window: usize,
    pub temperature: Option<f64>,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            backend: GenerationBackend::Extractive,
            model: "local-model".to_string(),
            base_url: "http://localhost:1234".to_string(),
            api_key: None,
            context_window: 4096,
            temperature: Some(0.3),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainEntry {
    pub description: String,
    pub keywords: Vec<String>,
    pub primary_sources: Vec<String>,
    pub questions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_yields_offline_defaults() {
        let settings = Settings::from_value(&json!({})).unwrap();
        assert_eq!(settings.search.engine, "google");
        assert_eq!(settings.search.results_per_call, 10);
        assert_eq!(settings.embedding.backend, EmbeddingBackend::Hashing);
        assert_eq!(settings.generation.backend, GenerationBackend::Extractive);
        assert_eq!(settings.spider.max_retries, 2);
        assert!(settings.domains.is_empty());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let settings = Settings::from_value(&json!({
            "spider": { "max_follow_up_queries": 4 },
            "generation": { "backend": "openai", "model": "qwen" }
        }))
        .unwrap();
        assert_eq!(settings.spider.max_follow_up_queries, 4);
        assert_eq!(settings.spider.backoff_base_ms, 250);
        assert_eq!(settings.generation.backend, GenerationBackend::OpenAi);
        assert_eq!(settings.generation.model, "qwen");
        assert_eq!(settings.generation.context_window, 4096);
    }

    #[test]
    fn wrong_types_are_rejected() {
        let err = Settings::from_value(&json!({ "rag": { "top_k": "three" } })).unwrap_err();
        assert!(matches!(err, ResearchError::BadRequest(_)));
    }
}
