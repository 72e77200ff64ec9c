//! Bounded fixed-backoff retry for rate-limited external calls
//!
//! Only [`Error::RateLimited`] is retried. Every other failure is returned on
//! the attempt that produced it.

use crate::config::RetryConfig;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(10),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff(),
        }
    }
}

pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limited() => {
                tracing::warn!(
                    "[RETRY] Rate limit hit in {operation_name}, retrying in {}s ({attempt}/{max_attempts})",
                    policy.backoff.as_secs_f64()
                );
                if attempt < max_attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::ExternalService(format!(
        "max retries exceeded for {operation_name}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_fails() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(), "enhance", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::RateLimited("429".to_string()))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(Error::ExternalService(msg)) => assert!(msg.contains("max retries exceeded")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(), "rerank", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::ExternalService("500".to_string()))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(Error::ExternalService(_))));
    }

    #[tokio::test]
    async fn test_succeeds_after_rate_limit() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(), "answer", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::RateLimited("429".to_string()))
            } else {
                Ok("done")
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
