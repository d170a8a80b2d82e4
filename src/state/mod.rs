use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{AppPaths, ConfigService, DomainRegistry, Settings};
use crate::credits::{CreditMonitor, PerCallEstimator, SerpApiAccount};
use crate::llm::LlmService;
use crate::pipeline::ResearchSession;
use crate::research::{ResearchSpider, SpiderConfig};
use crate::search::{SearchProvider, SerpApiSearch};

pub mod error;

use error::InitializationError;

/// Application state for one process.
///
/// Contains references to:
/// - Configuration, paths and the domain registry
/// - The search provider and its credit monitor
/// - Embedding / generation backends
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<Settings>,
    pub domains: DomainRegistry,
    pub search: Arc<dyn SearchProvider>,
    pub credits: Arc<CreditMonitor>,
    pub llm: LlmService,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// 1. Resolve paths and load the merged configuration
    /// 2. Build the domain registry
    /// 3. Set up the search provider and credit monitor
    /// 4. Select embedding and generation backends
    pub fn initialize() -> Result<Arc<Self>, InitializationError> {
        Self::with_paths(Arc::new(AppPaths::new()))
    }

    pub fn with_paths(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config.load_settings().map_err(InitializationError::Config)?;
        let domains = DomainRegistry::from_settings(&settings).map_err(InitializationError::Config)?;

        let search: Arc<dyn SearchProvider> =
            Arc::new(SerpApiSearch::new(&settings.search).map_err(InitializationError::Search)?);
        let account = SerpApiAccount::new(
            &settings.search.base_url,
            &settings.search.api_key,
            Duration::from_secs(settings.search.timeout_secs),
        )
        .map_err(InitializationError::Search)?;
        let credits = Arc::new(CreditMonitor::with_estimator(
            Arc::new(account),
            Box::new(PerCallEstimator {
                credits_per_call: settings.credits.credits_per_call,
            }),
        ));

        let llm = LlmService::from_settings(&settings).map_err(InitializationError::Llm)?;

        Ok(Arc::new(AppState {
            paths,
            config,
            settings: Arc::new(settings),
            domains,
            search,
            credits,
            llm,
        }))
    }

    /// A fresh session sharing this state's providers.
    pub fn session(&self) -> ResearchSession {
        let spider = ResearchSpider::new(
            self.search.clone(),
            self.credits.clone(),
            SpiderConfig::from_settings(&self.settings),
        );
        ResearchSession::new(spider, self.llm.clone(), self.settings.rag.clone())
    }
}
