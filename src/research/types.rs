use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub title: String,
    pub url: String,
    /// 1-based position inside the provider batch that produced the record.
    pub rank: u32,
    pub domain: String,
    pub source_query: String,
    pub domain_score: f32,
    pub retrieved_at: DateTime<Utc>,
}

/// A normalized, deduplicated search snippet. Never mutated after emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub text: String,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    Completed,
    /// Admission control refused the run; no provider call was made.
    BudgetDenied,
    /// Calls were made (or attempted) but nothing usable came back.
    NoSourcesFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub status: ResearchStatus,
    pub records: Vec<SearchRecord>,
    /// Provider calls that returned a response (after retries).
    pub calls_succeeded: usize,
    pub calls_failed: usize,
}

impl ResearchOutcome {
    pub fn budget_denied() -> Self {
        Self {
            status: ResearchStatus::BudgetDenied,
            records: Vec::new(),
            calls_succeeded: 0,
            calls_failed: 0,
        }
    }

    pub fn has_sources(&self) -> bool {
        self.status == ResearchStatus::Completed
    }
}
