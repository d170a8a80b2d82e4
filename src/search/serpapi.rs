use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde_json::Value;

use super::{RawSearchResult, SearchProvider, SearchRequest};
use crate::core::config::settings::SearchSettings;
use crate::core::errors::ResearchError;

/// SerpAPI client (`/search.json`), paced by a local rate limiter.
#[derive(Clone)]
pub struct SerpApiSearch {
    base_url: String,
    api_key: String,
    engine: String,
    client: Client,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl SerpApiSearch {
    pub fn new(settings: &SearchSettings) -> Result<Self, ResearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(ResearchError::internal)?;
        let per_second = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            engine: settings.engine.clone(),
            client,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        })
    }

    fn request_url(&self, request: &SearchRequest) -> String {
        format!(
            "{}/search.json?q={}&api_key={}&engine={}&num={}",
            self.base_url,
            urlencoding::encode(&request.query),
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&self.engine),
            request.num
        )
    }
}

#[async_trait]
impl SearchProvider for SerpApiSearch {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawSearchResult>, ResearchError> {
        if self.api_key.is_empty() {
            return Err(ResearchError::ProviderUnavailable(
                "search API key is not configured".to_string(),
            ));
        }

        self.limiter.until_ready().await;

        let response = self
            .client
            .get(self.request_url(request))
            .send()
            .await
            .map_err(ResearchError::unavailable)?;

        if !response.status().is_success() {
            return Err(ResearchError::ProviderUnavailable(format!(
                "SerpAPI search failed: {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ResearchError::MalformedResponse(e.to_string()))?;
        parse_organic_results(&payload)
    }
}

fn parse_organic_results(payload: &Value) -> Result<Vec<RawSearchResult>, ResearchError> {
    if let Some(error) = payload.get("error").and_then(|v| v.as_str()) {
        // "no results" is a legitimate empty answer, not a malformed one
        if error.contains("hasn't returned any results") {
            return Ok(Vec::new());
        }
        return Err(ResearchError::MalformedResponse(error.to_string()));
    }

    let Some(items) = payload.get("organic_results").and_then(|v| v.as_array()) else {
        return Err(ResearchError::MalformedResponse(
            "response has neither organic_results nor error".to_string(),
        ));
    };

    let field = |item: &Value, key: &str| {
        item.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    Ok(items
        .iter()
        .map(|item| RawSearchResult {
            title: field(item, "title"),
            snippet: field(item, "snippet"),
            link: field(item, "link"),
        })
        .collect())
}
