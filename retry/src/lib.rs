//! Wraps a unary async operation with exponential backoff and jitter, classifying each
//! failure as retryable or terminal via [`tcc_core::CoordinatorError::retryable`].
//!
//! The backoff sequence itself is computed with the [`backoff`] crate's
//! [`ExponentialBackoff`](backoff::ExponentialBackoff) (randomization disabled, since the
//! uniform jitter term is applied separately per the coordinator's own formula); only the
//! sleep and the jitter draw are ours.
#![forbid(unsafe_code)]

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use rand::Rng;
use tcc_core::CoordinatorError;
use tracing::{debug, warn};

/// Configuration for a [`RetryExecutor`].
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try. `maxRetries = 0` means "try
    /// once, never retry".
    pub max_retries: u32,
    /// Base delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Delay ceiling, in milliseconds; the exponential term is capped here before jitter.
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay on each successive attempt.
    pub backoff_multiplier: f64,
    /// Upper bound (exclusive) of the uniform jitter added to each delay, in milliseconds.
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_ms: 100,
        }
    }
}

/// A sink for retry observability, injected so this crate never depends on a concrete
/// metrics backend. `tcc-base`'s `CoreMetrics` implements this.
pub trait RetryMetrics: Send + Sync {
    /// Called once per attempt that failed with a retryable error and is about to be retried.
    fn record_retry(&self, operation: &str);
    /// Called when a retry loop gives up after exhausting `max_retries`.
    fn record_exhausted(&self, operation: &str);
}

/// A [`RetryMetrics`] that records nothing; useful in tests and for call sites that don't
/// care about retry observability.
pub struct NoopRetryMetrics;

impl RetryMetrics for NoopRetryMetrics {
    fn record_retry(&self, _operation: &str) {}
    fn record_exhausted(&self, _operation: &str) {}
}

/// Runs a fallible async operation under the exponential-backoff-with-jitter discipline
/// described by [`RetryConfig`].
pub struct RetryExecutor<'a> {
    config: RetryConfig,
    metrics: &'a dyn RetryMetrics,
}

impl<'a> RetryExecutor<'a> {
    /// Build an executor with the given configuration and metrics sink.
    pub fn new(config: RetryConfig, metrics: &'a dyn RetryMetrics) -> Self {
        Self { config, metrics }
    }

    fn backoff_sequence(&self) -> backoff::ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.base_delay_ms))
            .with_multiplier(self.config.backoff_multiplier)
            .with_max_interval(Duration::from_millis(self.config.max_delay_ms))
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }

    fn jitter(&self) -> Duration {
        if self.config.jitter_ms == 0 {
            return Duration::ZERO;
        }
        let millis = rand::thread_rng().gen_range(0..self.config.jitter_ms);
        Duration::from_millis(millis)
    }

    /// Run `op`, retrying on retryable failures per `config` and surfacing terminal failures
    /// (or the last failure once `max_retries` is exhausted) immediately.
    ///
    /// `operation` is a short label (e.g. `"confirm"`, `"cancel"`) used only for log fields
    /// and metrics; it does not affect retry behavior.
    pub async fn run<F, Fut>(&self, operation: &str, mut op: F) -> Result<(), CoordinatorError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<(), CoordinatorError>>,
    {
        let mut backoff = self.backoff_sequence();
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(()) => return Ok(()),
                Err(err) if !err.retryable() => {
                    debug!(operation, %err, "terminal error, not retrying");
                    return Err(err);
                }
                Err(err) => {
                    if attempt >= self.config.max_retries {
                        warn!(operation, attempts = attempt + 1, %err, "retries exhausted");
                        self.metrics.record_exhausted(operation);
                        return Err(err);
                    }

                    let base_delay = backoff.next_backoff().unwrap_or(Duration::from_millis(
                        self.config.max_delay_ms,
                    ));
                    let delay = base_delay + self.jitter();
                    warn!(operation, attempt, ?delay, %err, "retrying after backoff");
                    self.metrics.record_retry(operation);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tcc_core::{CoordinatorError, Phase};

    use super::*;

    fn participant_error(retryable: bool) -> CoordinatorError {
        CoordinatorError::ParticipantExecutionError {
            phase: Phase::Confirm,
            participant_id: "p".to_string(),
            source: Box::new(std::io::Error::other("boom")),
            retryable,
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let executor = RetryExecutor::new(RetryConfig::default(), &NoopRetryMetrics);
        let calls = AtomicU32::new(0);
        let result = executor
            .run("confirm", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter_ms: 1,
        };
        let executor = RetryExecutor::new(config, &NoopRetryMetrics);
        let calls = AtomicU32::new(0);
        let result = executor
            .run("confirm", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(participant_error(true))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_error_surfaces_immediately() {
        let executor = RetryExecutor::new(RetryConfig::default(), &NoopRetryMetrics);
        let calls = AtomicU32::new(0);
        let result = executor
            .run("try", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(participant_error(false)) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_and_surfaces_last_failure() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 2.0,
            jitter_ms: 1,
        };
        let executor = RetryExecutor::new(config, &NoopRetryMetrics);
        let calls = AtomicU32::new(0);
        let result = executor
            .run("cancel", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(participant_error(true)) }
            })
            .await;
        assert!(result.is_err());
        // initial attempt + 2 retries = 3 calls total
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
