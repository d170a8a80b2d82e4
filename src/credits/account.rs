//! Credit sources: where the remaining-credit count comes from.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::core::errors::ResearchError;

/// Reports the remaining credit count of a metered provider.
///
/// The count reflects real-world usage outside this process, so callers must
/// treat every answer as a fresh, non-deterministic reading.
#[async_trait]
pub trait CreditSource: Send + Sync {
    fn name(&self) -> &str;

    async fn remaining_credits(&self) -> Result<i64, ResearchError>;
}

/// SerpAPI `account.json` endpoint.
#[derive(Clone)]
pub struct SerpApiAccount {
    base_url: String,
    api_key: String,
    client: Client,
}

impl SerpApiAccount {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ResearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ResearchError::internal)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }
}

#[async_trait]
impl CreditSource for SerpApiAccount {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn remaining_credits(&self) -> Result<i64, ResearchError> {
        if self.api_key.is_empty() {
            return Err(ResearchError::ProviderUnavailable(
                "search API key is not configured".to_string(),
            ));
        }

        let url = format!(
            "{}/account.json?api_key={}",
            self.base_url,
            urlencoding::encode(&self.api_key)
        );
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ResearchError::unavailable)?;

        if !response.status().is_success() {
            return Err(ResearchError::ProviderUnavailable(format!(
                "account status request failed: {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await.map_err(ResearchError::unavailable)?;
        parse_account_payload(&payload)
    }
}

fn parse_account_payload(payload: &Value) -> Result<i64, ResearchError> {
    if let Some(error) = payload.get("error").and_then(|v| v.as_str()) {
        return Err(ResearchError::ProviderUnavailable(error.to_string()));
    }

    payload
        .get("total_searches_left")
        .or_else(|| payload.get("plan_searches_left"))
        .and_then(|v| v.as_i64())
        .ok_or_else(|| {
            ResearchError::ProviderUnavailable(
                "account status has no remaining-searches field".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_total_searches_left_first() {
        let payload = json!({ "total_searches_left": 42, "plan_searches_left": 7 });
        assert_eq!(parse_account_payload(&payload).unwrap(), 42);

        let payload = json!({ "plan_searches_left": 7 });
        assert_eq!(parse_account_payload(&payload).unwrap(), 7);
    }

    #[test]
    fn error_or_missing_field_is_unavailable() {
        let err = parse_account_payload(&json!({ "error": "Invalid API key." })).unwrap_err();
        assert!(matches!(err, ResearchError::ProviderUnavailable(ref m) if m == "Invalid API key."));

        let err = parse_account_payload(&json!({ "account_email": "x" })).unwrap_err();
        assert!(matches!(err, ResearchError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_network() {
        let account =
            SerpApiAccount::new("https://serpapi.com/", "", Duration::from_secs(1)).unwrap();
        assert!(account.remaining_credits().await.is_err());
    }
}
