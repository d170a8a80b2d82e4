//! Credit-aware admission control for the metered search provider.
//!
//! - `CreditMonitor::check_credits` reads the provider's remaining count and
//!   classifies it against fixed thresholds; provider failures fail closed.
//! - `CreditMonitor::can_start` gates an operation before any credit is spent.

mod account;

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::core::errors::ResearchError;

pub use account::{CreditSource, SerpApiAccount};

/// At or above this many credits the budget is healthy.
pub const WARNING_THRESHOLD: u64 = 100;
/// Below this many credits new work is discouraged (`can_proceed == false`).
pub const CRITICAL_THRESHOLD: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThresholdState {
    Ok,
    Warning,
    Critical,
    Exhausted,
}

impl ThresholdState {
    pub fn classify(remaining: u64) -> Self {
        if remaining == 0 {
            ThresholdState::Exhausted
        } else if remaining < CRITICAL_THRESHOLD {
            ThresholdState::Critical
        } else if remaining < WARNING_THRESHOLD {
            ThresholdState::Warning
        } else {
            ThresholdState::Ok
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditStatus {
    pub remaining: u64,
    pub threshold_state: ThresholdState,
    pub can_proceed: bool,
}

impl CreditStatus {
    /// Classify a raw provider reading; negative readings count as zero.
    pub fn from_remaining(remaining: i64) -> Self {
        let remaining = remaining.max(0) as u64;
        let threshold_state = ThresholdState::classify(remaining);
        Self {
            remaining,
            threshold_state,
            can_proceed: matches!(threshold_state, ThresholdState::Ok | ThresholdState::Warning),
        }
    }

    pub fn exhausted() -> Self {
        Self::from_remaining(0)
    }

    pub fn summary(&self) -> String {
        let advice = match self.threshold_state {
            ThresholdState::Ok => "budget healthy",
            ThresholdState::Warning => "budget running low, prefer small research runs",
            ThresholdState::Critical => "budget critical, new research is blocked",
            ThresholdState::Exhausted => "budget exhausted, no calls will be made",
        };
        format!(
            "Search credits: {} remaining [{:?}] - {}",
            self.remaining, self.threshold_state, advice
        )
    }
}

/// Advisory cost model for an upcoming batch of search calls.
pub trait CreditEstimator: Send + Sync {
    fn estimate(&self, expected_calls: u32) -> u64;
}

/// Flat pricing: every call costs the same number of credits.
#[derive(Debug, Clone, Copy)]
pub struct PerCallEstimator {
    pub credits_per_call: u64,
}

impl Default for PerCallEstimator {
    fn default() -> Self {
        Self {
            credits_per_call: 1,
        }
    }
}

impl CreditEstimator for PerCallEstimator {
    fn estimate(&self, expected_calls: u32) -> u64 {
        u64::from(expected_calls).saturating_mul(self.credits_per_call)
    }
}

pub struct CreditMonitor {
    source: Arc<dyn CreditSource>,
    estimator: Box<dyn CreditEstimator>,
    last_remaining: Mutex<Option<u64>>,
}

impl CreditMonitor {
    pub fn new(source: Arc<dyn CreditSource>) -> Self {
        Self::with_estimator(source, Box::new(PerCallEstimator::default()))
    }

    pub fn with_estimator(source: Arc<dyn CreditSource>, estimator: Box<dyn CreditEstimator>) -> Self {
        Self {
            source,
            estimator,
            last_remaining: Mutex::new(None),
        }
    }

    pub fn estimate(&self, expected_calls: u32) -> u64 {
        self.estimator.estimate(expected_calls)
    }

    /// Last count observed by an explicit check; `None` before the first one.
    pub fn last_known_remaining(&self) -> Option<u64> {
        self.last_remaining.lock().ok().and_then(|guard| *guard)
    }

    /// Query the provider and classify, surfacing provider failures.
    pub async fn try_check_credits(&self) -> Result<CreditStatus, ResearchError> {
        let remaining = self.source.remaining_credits().await?;
        let status = CreditStatus::from_remaining(remaining);
        if let Ok(mut guard) = self.last_remaining.lock() {
            *guard = Some(status.remaining);
        }
        Ok(status)
    }

    /// Fail-closed credit check: any provider error reads as exhausted.
    pub async fn check_credits(&self, verbose: bool) -> CreditStatus {
        let status = match self.try_check_credits().await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(
                    "Credit check against '{}' failed, treating budget as exhausted: {}",
                    self.source.name(),
                    err
                );
                CreditStatus::exhausted()
            }
        };

        if verbose {
            tracing::info!("{}", status.summary());
        } else if status.threshold_state != ThresholdState::Ok {
            tracing::debug!("{}", status.summary());
        }

        status
    }

    /// Admission gate evaluated before any credit is spent.
    pub async fn can_start(&self, expected_calls: u32) -> bool {
        let needed = self.estimate(expected_calls);
        let status = self.check_credits(false).await;
        let admitted =
            status.threshold_state != ThresholdState::Exhausted && status.remaining >= needed;
        if !admitted {
            tracing::warn!(
                "Admission denied: {} calls need ~{} credits, {} remaining",
                expected_calls,
                needed,
                status.remaining
            );
        }
        admitted
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::testing::FixedCredits;
    use super::*;

    #[test]
    fn classification_boundaries() {
        assert_eq!(ThresholdState::classify(0), ThresholdState::Exhausted);
        assert_eq!(ThresholdState::classify(1), ThresholdState::Critical);
        assert_eq!(ThresholdState::classify(19), ThresholdState::Critical);
        assert_eq!(ThresholdState::classify(20), ThresholdState::Warning);
        assert_eq!(ThresholdState::classify(99), ThresholdState::Warning);
        assert_eq!(ThresholdState::classify(100), ThresholdState::Ok);
        assert_eq!(ThresholdState::classify(u64::MAX), ThresholdState::Ok);
    }

    #[test]
    fn below_critical_never_proceeds() {
        for remaining in -5..20 {
            let status = CreditStatus::from_remaining(remaining);
            assert!(matches!(
                status.threshold_state,
                ThresholdState::Critical | ThresholdState::Exhausted
            ));
            assert!(!status.can_proceed, "remaining={remaining}");
        }
    }

    #[test]
    fn at_or_above_warning_is_ok() {
        for remaining in [100, 101, 500, 10_000] {
            let status = CreditStatus::from_remaining(remaining);
            assert_eq!(status.threshold_state, ThresholdState::Ok);
            assert!(status.can_proceed);
        }
    }

    #[test]
    fn estimator_is_overridable() {
        struct Premium;
        impl CreditEstimator for Premium {
            fn estimate(&self, expected_calls: u32) -> u64 {
                u64::from(expected_calls) * 3
            }
        }

        let monitor = CreditMonitor::new(FixedCredits::new(Some(50)));
        assert_eq!(monitor.estimate(4), 4);

        let monitor = CreditMonitor::with_estimator(FixedCredits::new(Some(50)), Box::new(Premium));
        assert_eq!(monitor.estimate(4), 12);
    }

    #[tokio::test]
    async fn provider_failure_fails_closed() {
        let monitor = CreditMonitor::new(FixedCredits::new(None));
        let status = monitor.check_credits(true).await;
        assert_eq!(status.threshold_state, ThresholdState::Exhausted);
        assert!(!status.can_proceed);
        assert_eq!(status.remaining, 0);
        assert!(!monitor.can_start(1).await);
        assert!(monitor.try_check_credits().await.is_err());
    }

    #[tokio::test]
    async fn can_start_requires_enough_credits() {
        let monitor = CreditMonitor::new(FixedCredits::new(Some(5)));
        assert!(!monitor.can_start(10).await);
        assert!(monitor.can_start(5).await);

        let monitor = CreditMonitor::new(FixedCredits::new(Some(0)));
        assert!(!monitor.can_start(0).await);
    }

    #[tokio::test]
    async fn every_check_refreshes_the_reading() {
        let source = FixedCredits::new(Some(150));
        let monitor = CreditMonitor::new(source.clone());
        assert_eq!(monitor.last_known_remaining(), None);

        monitor.check_credits(false).await;
        monitor.check_credits(false).await;
        assert_eq!(source.check_count(), 2);
        assert_eq!(monitor.last_known_remaining(), Some(150));
    }

    #[tokio::test]
    async fn failed_check_keeps_the_last_observed_reading() {
        struct GoesOffline(AtomicUsize);

        #[async_trait::async_trait]
        impl CreditSource for GoesOffline {
            fn name(&self) -> &str {
                "flaky"
            }

            async fn remaining_credits(&self) -> Result<i64, ResearchError> {
                match self.0.fetch_add(1, Ordering::SeqCst) {
                    0 => Ok(150),
                    _ => Err(ResearchError::ProviderUnavailable("offline".to_string())),
                }
            }
        }

        let monitor = CreditMonitor::new(Arc::new(GoesOffline(AtomicUsize::new(0))));
        assert!(monitor.check_credits(false).await.can_proceed);

        let status = monitor.check_credits(false).await;
        assert_eq!(status.threshold_state, ThresholdState::Exhausted);
        assert!(!status.can_proceed);
        assert_eq!(monitor.last_known_remaining(), Some(150));
    }
}
