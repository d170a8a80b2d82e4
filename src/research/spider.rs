//! Research spider: turns a (query, domain) pair into budget-checked search
//! calls and a deduplicated, rank-ordered list of `SearchRecord`s.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;

use super::dedup::{normalize_text, Admission, Deduplicator};
use super::scoring::domain_score;
use super::types::{RecordMetadata, ResearchOutcome, ResearchStatus, SearchRecord};
use crate::core::config::settings::{Settings, MAX_CALLS_PER_RESEARCH};
use crate::core::config::DomainProfile;
use crate::core::errors::ResearchError;
use crate::credits::CreditMonitor;
use crate::search::{RawSearchResult, SearchProvider, SearchRequest};

#[derive(Debug, Clone)]
pub struct SpiderConfig {
    pub results_per_call: u32,
    pub max_follow_up_queries: usize,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub near_duplicate_threshold: f32,
}

impl SpiderConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            results_per_call: settings.search.results_per_call,
            max_follow_up_queries: settings.spider.max_follow_up_queries,
            max_retries: settings.spider.max_retries,
            backoff_base: Duration::from_millis(settings.spider.backoff_base_ms),
            near_duplicate_threshold: settings.spider.near_duplicate_threshold,
        }
    }
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

struct Candidate {
    rank: u32,
    call_index: usize,
    record: SearchRecord,
}

pub struct ResearchSpider {
    provider: Arc<dyn SearchProvider>,
    monitor: Arc<CreditMonitor>,
    config: SpiderConfig,
}

impl ResearchSpider {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        monitor: Arc<CreditMonitor>,
        config: SpiderConfig,
    ) -> Self {
        Self {
            provider,
            monitor,
            config,
        }
    }

    pub fn monitor(&self) -> &Arc<CreditMonitor> {
        &self.monitor
    }

    /// Primary query followed by keyword follow-ups, capped at
    /// `MAX_CALLS_PER_RESEARCH` calls in total.
    pub fn plan_queries(&self, query: &str, domain: &DomainProfile) -> Vec<String> {
        let query = query.trim();
        let mut plan = vec![query.to_string()];
        let normalized_query = format!(" {} ", normalize_text(query));

        let follow_up_budget = self
            .config
            .max_follow_up_queries
            .min(MAX_CALLS_PER_RESEARCH - 1);
        let follow_ups = domain
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| {
                let key = normalize_text(k);
                !key.is_empty() && !normalized_query.contains(&format!(" {} ", key))
            })
            .take(follow_up_budget)
            .map(|k| format!("{} {}", query, k));

        plan.extend(follow_ups);
        plan
    }

    /// Run the research plan for `query` within `domain`.
    ///
    /// Budget denial and empty results are ordinary outcomes reported through
    /// `ResearchOutcome::status`, never errors.
    pub async fn research(
        &self,
        query: &str,
        domain: &DomainProfile,
        estimate_first: bool,
    ) -> ResearchOutcome {
        if query.trim().is_empty() {
            tracing::warn!("Empty research query, nothing to do");
            return ResearchOutcome {
                status: ResearchStatus::NoSourcesFound,
                records: Vec::new(),
                calls_succeeded: 0,
                calls_failed: 0,
            };
        }

        let plan = self.plan_queries(query, domain);
        if estimate_first && !self.monitor.can_start(plan.len() as u32).await {
            return ResearchOutcome::budget_denied();
        }

        tracing::info!(
            "Researching '{}' in domain '{}' with {} planned calls",
            query.trim(),
            domain.name,
            plan.len()
        );

        let mut candidates = Vec::new();
        let mut calls_succeeded = 0;
        let mut calls_failed = 0;

        for (call_index, planned_query) in plan.iter().enumerate() {
            match self.search_with_retry(planned_query).await {
                Ok(results) => {
                    calls_succeeded += 1;
                    let limit = self.config.results_per_call as usize;
                    for (position, raw) in results.into_iter().take(limit).enumerate() {
                        if let Some(record) =
                            normalize_result(raw, position as u32 + 1, domain, planned_query)
                        {
                            candidates.push(Candidate {
                                rank: record.metadata.rank,
                                call_index,
                                record,
                            });
                        }
                    }
                }
                Err(err) => {
                    calls_failed += 1;
                    tracing::warn!("Skipping search call '{}': {}", planned_query, err);
                }
            }
        }

        let records = self.deduplicate(candidates);
        let status = if records.is_empty() {
            tracing::warn!(
                "No sources found for '{}' ({} calls ok, {} failed)",
                query.trim(),
                calls_succeeded,
                calls_failed
            );
            ResearchStatus::NoSourcesFound
        } else {
            tracing::info!("Collected {} unique records", records.len());
            ResearchStatus::Completed
        };

        ResearchOutcome {
            status,
            records,
            calls_succeeded,
            calls_failed,
        }
    }

    fn deduplicate(&self, mut candidates: Vec<Candidate>) -> Vec<SearchRecord> {
        // stable: equal ranks keep call order
        candidates.sort_by_key(|c| (c.rank, c.call_index));

        let mut dedup = Deduplicator::new(self.config.near_duplicate_threshold);
        let mut records = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match dedup.admit(&candidate.record.metadata.url, &candidate.record.text) {
                Admission::Accepted => records.push(candidate.record),
                rejected => tracing::debug!(
                    "Dropped {:?} result '{}' (rank {})",
                    rejected,
                    candidate.record.metadata.url,
                    candidate.rank
                ),
            }
        }
        records
    }

    async fn search_with_retry(&self, query: &str) -> Result<Vec<RawSearchResult>, ResearchError> {
        let request = SearchRequest {
            query: query.to_string(),
            num: self.config.results_per_call,
        };

        let mut attempt = 0;
        loop {
            match self.provider.search(&request).await {
                Ok(results) => return Ok(results),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(self.config.backoff_base, attempt);
                    tracing::warn!(
                        "Search '{}' failed (attempt {}/{}), retrying in {:?}: {}",
                        query,
                        attempt,
                        self.config.max_retries,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// `base * 2^(attempt-1)` plus up to 50% random jitter.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    let jitter_cap = exponential.as_millis() as u64 / 2;
    let jitter = if jitter_cap == 0 {
        0
    } else {
        rand::rng().random_range(0..=jitter_cap)
    };
    exponential + Duration::from_millis(jitter)
}

fn normalize_result(
    raw: RawSearchResult,
    rank: u32,
    domain: &DomainProfile,
    source_query: &str,
) -> Option<SearchRecord> {
    let text = raw.snippet.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalize_text(&text).is_empty() {
        return None;
    }

    let title = raw.title.trim().to_string();
    let url = raw.link.trim().to_string();
    let score = domain_score(domain, &title, &text, &url);

    Some(SearchRecord {
        text,
        metadata: RecordMetadata {
            title,
            url,
            rank,
            domain: domain.name.clone(),
            source_query: source_query.to_string(),
            domain_score: score,
            retrieved_at: Utc::now(),
        },
    })
}
