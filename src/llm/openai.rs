use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::{Embedder, Generator};
use super::types::{ChatMessage, ChatRequest, ProviderModel};
use crate::core::config::settings::{EmbeddingSettings, GenerationSettings};
use crate::core::errors::ResearchError;

const EMBEDDING_TIMEOUT_SECS: u64 = 60;

const SYSTEM_PROMPT: &str = "You answer questions using only the provided context. \
If the context does not contain the answer, say so briefly.";

/// Client for any server exposing the OpenAI REST surface
/// (`/v1/models`, `/v1/embeddings`, `/v1/chat/completions`), e.g. LM Studio,
/// llama.cpp server or vLLM.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    context_window: usize,
    temperature: Option<f64>,
    client: Client,
}

#[derive(Deserialize)]
struct OpenAiModelsResponse {
    data: Vec<OpenAiModelInfo>,
}

#[derive(Deserialize)]
struct OpenAiModelInfo {
    id: String,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ResearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ResearchError::internal)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            context_window: GenerationSettings::default().context_window,
            temperature: None,
            client,
        })
    }

    pub fn for_embeddings(settings: &EmbeddingSettings) -> Result<Self, ResearchError> {
        Self::new(
            &settings.base_url,
            &settings.model,
            settings.api_key.clone(),
            Duration::from_secs(EMBEDDING_TIMEOUT_SECS),
        )
    }

    pub fn for_generation(settings: &GenerationSettings) -> Result<Self, ResearchError> {
        let mut client = Self::new(
            &settings.base_url,
            &settings.model,
            settings.api_key.clone(),
            Duration::from_secs(settings.timeout_secs),
        )?;
        client.context_window = settings.context_window;
        client.temperature = settings.temperature;
        Ok(client)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    pub async fn list_models(&self) -> Result<Vec<ProviderModel>, ResearchError> {
        let url = format!("{}/v1/models", self.base_url);
        let res = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(ResearchError::unavailable)?;

        if !res.status().is_success() {
            return Err(ResearchError::ProviderUnavailable(format!(
                "Failed to list models: {}",
                res.status()
            )));
        }

        let response: OpenAiModelsResponse = res
            .json()
            .await
            .map_err(|e| ResearchError::MalformedResponse(e.to_string()))?;

        Ok(response
            .data
            .into_iter()
            .map(|m| ProviderModel { id: m.id })
            .collect())
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<String, ResearchError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = serde_json::to_value(&request).map_err(ResearchError::internal)?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("model".to_string(), json!(self.model));
            obj.insert("stream".to_string(), json!(false));
        }

        let res = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ResearchError::Generation(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ResearchError::Generation(format!(
                "chat completion failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ResearchError::Generation(e.to_string()))?;
        parse_chat_content(&payload)
    }
}

#[async_trait]
impl Embedder for OpenAiCompatibleClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ResearchError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let res = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ResearchError::Embedding(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ResearchError::Embedding(format!(
                "embedding request failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ResearchError::Embedding(e.to_string()))?;
        parse_embeddings(&payload, inputs.len())
    }
}

#[async_trait]
impl Generator for OpenAiCompatibleClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    async fn load(&self) -> Result<(), ResearchError> {
        let models = self
            .list_models()
            .await
            .map_err(|e| ResearchError::ModelLoad(format!("{} ({})", e, self.base_url)))?;

        if models.iter().any(|m| m.id == self.model) {
            tracing::info!("Generation model '{}' available at {}", self.model, self.base_url);
            Ok(())
        } else {
            Err(ResearchError::ModelLoad(format!(
                "model '{}' is not served by {} (available: {})",
                self.model,
                self.base_url,
                models
                    .iter()
                    .map(|m| m.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String, ResearchError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ])
        .with_temperature(self.temperature)
        .with_max_tokens(max_new_tokens);
        self.chat(request).await
    }
}

fn parse_chat_content(payload: &Value) -> Result<String, ResearchError> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| ResearchError::Generation("response has no choices[0].message.content".into()))
}

fn parse_embeddings(payload: &Value, expected: usize) -> Result<Vec<Vec<f32>>, ResearchError> {
    let Some(data) = payload["data"].as_array() else {
        return Err(ResearchError::Embedding("response has no data array".into()));
    };

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let Some(values) = item["embedding"].as_array() else {
            return Err(ResearchError::Embedding(format!("item {} has no embedding", position)));
        };
        let vector: Vec<f32> = values
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();
        let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
        indexed.push((index, vector));
    }
    // servers may return items out of input order
    indexed.sort_by_key(|(index, _)| *index);

    if indexed.len() != expected {
        return Err(ResearchError::Embedding(format!(
            "expected {} embeddings, got {}",
            expected,
            indexed.len()
        )));
    }
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}
