/// Retry policy with linear backoff for transient gRPC failures
use crate::metrics::RetryMetrics;
use std::future::Future;
use std::time::Duration;
use tonic::{Code, Status};
use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Delay before the first retry; retry `n` waits `base_delay * n`
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("All {attempts} attempts failed for {method}: {status}")]
    Exhausted {
        method: String,
        attempts: u32,
        status: Status,
    },
    #[error("Non-retryable failure for {method}: {status}")]
    NotRetryable { method: String, status: Status },
}

impl RetryError {
    /// Status of the last failed attempt
    pub fn status(&self) -> &Status {
        match self {
            Self::Exhausted { status, .. } | Self::NotRetryable { status, .. } => status,
        }
    }

    pub fn into_status(self) -> Status {
        match self {
            Self::Exhausted { status, .. } | Self::NotRetryable { status, .. } => status,
        }
    }
}

impl From<RetryError> for Status {
    fn from(err: RetryError) -> Self {
        err.into_status()
    }
}

/// Whether a failure is worth retrying (injected faults included)
pub fn is_transient(status: &Status) -> bool {
    matches!(
        status.code(),
        Code::Unavailable | Code::DeadlineExceeded | Code::Aborted
    )
}

/// Execute a gRPC call with retry logic
///
/// `f` is invoked once per attempt and must build a fresh request each time,
/// so every attempt passes through the client's interceptors again.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, method: &str, mut f: F) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Status>>,
{
    let attempts_allowed = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        attempt += 1;

        let status = match f().await {
            Ok(result) => {
                RetryMetrics::record_attempts("success", attempt);
                return Ok(result);
            }
            Err(status) => status,
        };

        if !is_transient(&status) {
            RetryMetrics::record_attempts("not_retryable", attempt);
            return Err(RetryError::NotRetryable {
                method: method.to_string(),
                status,
            });
        }

        if attempt >= attempts_allowed {
            error!(method, attempts = attempt, code = ?status.code(), "All retry attempts failed");
            RetryMetrics::record_attempts("exhausted", attempt);
            return Err(RetryError::Exhausted {
                method: method.to_string(),
                attempts: attempt,
                status,
            });
        }

        let delay = config.delay_for(attempt);
        warn!(
            method,
            attempt,
            max_attempts = attempts_allowed,
            code = ?status.code(),
            delay_ms = delay.as_millis() as u64,
            "Transient failure, retrying"
        );

        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_transient_codes() {
        assert!(is_transient(&Status::unavailable("down")));
        assert!(is_transient(&Status::deadline_exceeded("slow")));
        assert!(is_transient(&Status::aborted("conflict")));
        assert!(!is_transient(&Status::internal("bug")));
        assert!(!is_transient(&Status::unauthenticated("who")));
    }

    #[test]
    fn test_linear_delays() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(3), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let config = RetryConfig::default();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&config, "/test.Service/Get", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Status>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_after_failures() {
        let config = RetryConfig::default();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&config, "/test.Service/Get", move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err(Status::unavailable("temporary error"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_max_retries_exceeded() {
        let config = RetryConfig::default();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&config, "/test.Service/Get", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(Status::deadline_exceeded("persistent error")) }
        })
        .await;

        match result {
            Err(RetryError::Exhausted { attempts, status, .. }) => {
                assert_eq!(attempts, 4);
                assert_eq!(status.code(), Code::DeadlineExceeded);
            }
            other => panic!("expected exhausted retries, got {:?}", other),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 4); // Initial + 3 retries
    }

    #[tokio::test]
    async fn test_non_transient_is_not_retried() {
        let config = RetryConfig::default();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&config, "/test.Service/Get", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(Status::permission_denied("no")) }
        })
        .await;

        let status: Status = result.unwrap_err().into();
        assert_eq!(status.code(), Code::PermissionDenied);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_backoff_total_delay() {
        let config = RetryConfig::default();
        let start = tokio::time::Instant::now();

        let _ = with_retry(&config, "/test.Service/Get", || async {
            Err::<i32, _>(Status::unavailable("error"))
        })
        .await;

        // 100ms + 200ms + 300ms
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(600));
        assert!(elapsed < Duration::from_millis(700));
    }
}
