//! One research session: admission check, research, index build, model load,
//! then the domain's questions in order.
//!
//! RAG-stage failures are recorded on the report and never discard the
//! research records already collected.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::config::settings::RagSettings;
use crate::core::config::DomainProfile;
use crate::credits::{CreditMonitor, CreditStatus};
use crate::llm::LlmService;
use crate::rag::{QueryResult, RagOrchestrator};
use crate::research::{ResearchSpider, ResearchStatus, SearchRecord};

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub query: String,
    pub domain: String,
    pub generated_at: DateTime<Utc>,
    /// Budget as seen before research started.
    pub credits: CreditStatus,
    pub status: ResearchStatus,
    pub records: Vec<SearchRecord>,
    pub answers: Vec<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag_error: Option<String>,
}

impl SessionReport {
    /// True when every domain question went through the RAG stage.
    pub fn rag_completed(&self) -> bool {
        self.status == ResearchStatus::Completed && self.rag_error.is_none()
    }

    /// Plain-text digest of the collected records for when RAG is unavailable.
    pub fn fallback_summary(&self) -> String {
        let mut out = format!("FALLBACK SUMMARY for \"{}\"\n", self.domain);
        let _ = writeln!(out, "Query: {}", self.query);

        match self.status {
            ResearchStatus::BudgetDenied => {
                let _ = writeln!(
                    out,
                    "Research was not started: insufficient search credits ({} remaining).",
                    self.credits.remaining
                );
                return out;
            }
            ResearchStatus::NoSourcesFound => {
                let _ = writeln!(out, "No sources were found.");
                return out;
            }
            ResearchStatus::Completed => {}
        }

        if let Some(err) = &self.rag_error {
            let _ = writeln!(out, "Analysis unavailable: {}", err);
        }
        let _ = writeln!(out, "Sources: {}", self.records.len());
        for (i, record) in self.records.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {} ({})\n   {}",
                i + 1,
                record.metadata.title,
                record.metadata.url,
                record.text
            );
        }
        out
    }
}

pub struct ResearchSession {
    monitor: Arc<CreditMonitor>,
    spider: ResearchSpider,
    llm: LlmService,
    rag: RagSettings,
}

impl ResearchSession {
    pub fn new(spider: ResearchSpider, llm: LlmService, rag: RagSettings) -> Self {
        Self {
            monitor: spider.monitor().clone(),
            spider,
            llm,
            rag,
        }
    }

    pub async fn run(&self, query: &str, domain: &DomainProfile) -> SessionReport {
        let session_id = Uuid::new_v4();
        tracing::info!(
            "Session {} started: query='{}', domain='{}'",
            session_id,
            query,
            domain.name
        );

        let credits = self.monitor.check_credits(true).await;
        let outcome = self.spider.research(query, domain, true).await;
        let has_sources = outcome.has_sources();

        let mut report = SessionReport {
            session_id,
            query: query.trim().to_string(),
            domain: domain.name.clone(),
            generated_at: Utc::now(),
            credits,
            status: outcome.status,
            records: outcome.records,
            answers: Vec::new(),
            rag_error: None,
        };

        if !has_sources {
            tracing::info!("Session {} ends without RAG: {:?}", session_id, report.status);
            return report;
        }

        // the index is owned by this session only
        let mut rag = RagOrchestrator::from_service(&self.llm, self.rag.include_citations);
        if let Err(err) = rag.build_index_from_records(&report.records).await {
            tracing::error!("Index build failed: {}", err);
            report.rag_error = Some(err.to_string());
            return report;
        }
        if let Err(err) = rag.load_model().await {
            tracing::error!("Model load failed: {}", err);
            report.rag_error = Some(err.to_string());
            return report;
        }

        report.answers = rag
            .answer_questions(&domain.questions, self.rag.top_k, self.rag.max_new_tokens)
            .await;

        let failed = report.answers.iter().filter(|a| a.is_error()).count();
        tracing::info!(
            "Session {} finished: {} records, {} answers ({} failed)",
            session_id,
            report.records.len(),
            report.answers.len(),
            failed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::core::config::Settings;
    use crate::core::errors::ResearchError;
    use crate::credits::testing::FixedCredits;
    use crate::llm::{Generator, TokenCounter};
    use crate::rag::ERROR_MARKER;
    use crate::research::SpiderConfig;
    use crate::search::{RawSearchResult, SearchProvider, SearchRequest};

    /// Returns the same batch for every query.
    #[derive(Default)]
    struct StaticProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }

        async fn search(&self, request: &SearchRequest) -> Result<Vec<RawSearchResult>, ResearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                RawSearchResult {
                    title: "Rosa canina".to_string(),
                    snippet: format!("Dog rose is a climbing wild rose species native to Europe ({}).", request.query),
                    link: "https://en.wikipedia.org/wiki/Rosa_canina".to_string(),
                },
                RawSearchResult {
                    title: "Rose hips".to_string(),
                    snippet: "Rose hips are rich in vitamin C and used for syrup.".to_string(),
                    link: "https://herbs.example/rose-hips".to_string(),
                },
            ])
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl Generator for BrokenGenerator {
        fn model_id(&self) -> &str {
            "broken"
        }

        fn context_window(&self) -> usize {
            2048
        }

        async fn load(&self) -> Result<(), ResearchError> {
            Err(ResearchError::ModelLoad("weights not found".into()))
        }

        async fn generate(&self, _prompt: &str, _max: u32) -> Result<String, ResearchError> {
            Err(ResearchError::Generation("unreachable".into()))
        }
    }

    fn domain() -> DomainProfile {
        DomainProfile {
            name: "botany".to_string(),
            description: "Plants".to_string(),
            keywords: vec!["species".to_string()],
            primary_sources: vec!["wikipedia.org".to_string()],
            questions: vec![
                "Where is dog rose native?".to_string(),
                "What are rose hips used for?".to_string(),
            ],
        }
    }

    fn session(provider: Arc<StaticProvider>, credits: i64, llm: LlmService) -> ResearchSession {
        let monitor = Arc::new(CreditMonitor::new(FixedCredits::new(Some(credits))));
        let spider = ResearchSpider::new(
            provider,
            monitor,
            SpiderConfig {
                backoff_base: std::time::Duration::ZERO,
                ..SpiderConfig::default()
            },
        );
        ResearchSession::new(spider, llm, RagSettings::default())
    }

    fn offline_llm() -> LlmService {
        LlmService::from_settings(&Settings::default()).unwrap()
    }

    #[tokio::test]
    async fn full_session_answers_every_domain_question() {
        let provider = Arc::new(StaticProvider::default());
        let report = session(provider.clone(), 500, offline_llm())
            .run("dog rose", &domain())
            .await;

        assert_eq!(report.status, ResearchStatus::Completed);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        // the second call repeats both URLs
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.answers.len(), 2);
        assert!(report.answers.iter().all(|a| !a.is_error()));
        assert!(report.answers[0].answer.contains("Europe"));
        assert!(report.rag_completed());
        assert_eq!(report.domain, "botany");
    }

    #[tokio::test]
    async fn denied_budget_skips_everything() {
        let provider = Arc::new(StaticProvider::default());
        let report = session(provider.clone(), 1, offline_llm())
            .run("dog rose", &domain())
            .await;

        assert_eq!(report.status, ResearchStatus::BudgetDenied);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(report.records.is_empty());
        assert!(report.answers.is_empty());
        assert!(!report.rag_completed());
        assert!(report.fallback_summary().contains("insufficient search credits (1 remaining)"));
    }

    #[tokio::test]
    async fn model_load_failure_keeps_records() {
        let llm = LlmService::new(
            offline_llm().embedder,
            Arc::new(BrokenGenerator),
            TokenCounter::estimating(),
        );
        let report = session(Arc::new(StaticProvider::default()), 500, llm)
            .run("dog rose", &domain())
            .await;

        assert_eq!(report.status, ResearchStatus::Completed);
        assert_eq!(report.records.len(), 2);
        assert!(report.answers.is_empty());
        assert!(report.rag_error.as_deref().unwrap_or("").contains("weights not found"));

        let summary = report.fallback_summary();
        assert!(summary.starts_with("FALLBACK SUMMARY for \"botany\"\n"));
        assert!(summary.contains("Sources: 2"));
        assert!(summary.contains("1. Rosa canina (https://en.wikipedia.org/wiki/Rosa_canina)"));
    }

    #[tokio::test]
    async fn report_serializes_with_upper_case_budget_state() {
        let report = session(Arc::new(StaticProvider::default()), 500, offline_llm())
            .run("dog rose", &domain())
            .await;
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["credits"]["threshold_state"], "OK");
        assert_eq!(value["status"], "completed");
        assert!(value.get("rag_error").is_none());
        assert!(!value["answers"][0]["answer"]
            .as_str()
            .unwrap()
            .starts_with(ERROR_MARKER));
    }
}
