// Bounded retry and timeout combinators shared by every network step

use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::config::RetrySettings;
use crate::workflows::WorkflowError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            jitter: settings.jitter,
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits, for tests and one-shot steps
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Delays between attempts: base, 2*base, 4*base ... capped at max_delay
    pub fn delays(&self) -> Vec<Duration> {
        let factor = (self.base_delay.as_millis() as u64 / 2).max(1);
        let retries = self.max_attempts.saturating_sub(1) as usize;
        if self.base_delay.is_zero() {
            return vec![Duration::ZERO; retries];
        }
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .take(retries)
            .map(|delay| if self.jitter { jitter(delay) } else { delay })
            .collect()
    }

    /// Run `action` until it succeeds, fails with a non-retryable error, or
    /// attempts run out
    pub async fn run<F, Fut, T>(&self, operation: &str, action: F) -> Result<T, WorkflowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WorkflowError>>,
    {
        self.run_if(operation, action, WorkflowError::is_retryable).await
    }

    pub async fn run_if<F, Fut, T, C>(
        &self,
        operation: &str,
        action: F,
        mut should_retry: C,
    ) -> Result<T, WorkflowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WorkflowError>>,
        C: FnMut(&WorkflowError) -> bool,
    {
        debug!(operation = %operation, max_attempts = self.max_attempts, "Starting retryable operation");
        RetryIf::spawn(self.delays(), action, |error: &WorkflowError| {
            let retry = should_retry(error);
            if retry {
                warn!(operation = %operation, error = %error, "Operation failed, retrying");
            }
            retry
        })
        .await
    }
}

/// Bound `future` by `limit`, failing with `Timeout` instead of hanging
pub async fn with_timeout<T, Fut>(operation: &str, limit: Duration, future: Fut) -> Result<T, WorkflowError>
where
    Fut: Future<Output = Result<T, WorkflowError>>,
{
    tokio::time::timeout(limit, future)
        .await
        .unwrap_or_else(|_| {
            Err(WorkflowError::Timeout {
                operation: operation.to_string(),
                duration_ms: limit.as_millis() as u64,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_success_after_failure() {
        let policy = RetryPolicy::immediate(3);
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = attempt_count.clone();

        let result = policy
            .run("flaky", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(WorkflowError::Transport("connection reset".into()))
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let policy = RetryPolicy::immediate(3);
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = attempt_count.clone();

        let result: Result<(), _> = policy
            .run("forbidden", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(WorkflowError::Unauthorized("wrong role".into())) }
            })
            .await;

        assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let policy = RetryPolicy::immediate(4);
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = attempt_count.clone();

        let result: Result<(), _> = policy
            .run("down", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(WorkflowError::Transport("refused".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(1500),
            jitter: false,
        };
        assert_eq!(
            policy.delays(),
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(1500),
                Duration::from_millis(1500),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_error() {
        let result: Result<(), _> = with_timeout("poll", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert_eq!(
            result,
            Err(WorkflowError::Timeout { operation: "poll".into(), duration_ms: 50 })
        );
    }
}
