//! External search provider interface.

mod serpapi;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ResearchError;

pub use serpapi::SerpApiSearch;

/// One organic result as the provider returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSearchResult {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub num: u32,
}

/// A metered web search API. Each `search` call consumes provider credits.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawSearchResult>, ResearchError>;
}
