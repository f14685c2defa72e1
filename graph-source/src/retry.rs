use errors::SourceError;
use metrics::counter;
use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::warn;

/// Bounded exponential backoff applied around a single HTTP call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1)
        }
    }

    fn strategy(&self) -> impl Iterator<Item = Duration> {
        let factor = (self.initial_backoff.as_millis() as u64 / 2).max(1);
        let max_backoff = self.max_backoff;
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(max_backoff)
            .map(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&config::RetryConfig::default())
    }
}

impl From<&config::RetryConfig> for RetryPolicy {
    fn from(c: &config::RetryConfig) -> Self {
        Self {
            max_retries: c.max_retries,
            initial_backoff: Duration::from_millis(c.initial_backoff_ms),
            max_backoff: Duration::from_millis(c.max_backoff_ms)
        }
    }
}

/// Runs `operation`, retrying retryable [`SourceError`]s with jittered
/// exponential backoff. `Auth`, `Timeout` and 4xx failures return at once.
///
/// A rate-limit response waits for its `Retry-After`, capped at the policy's
/// maximum backoff.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    operation: F
) -> Result<T, SourceError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>
{
    let mut backoff = policy.strategy();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() || attempt > policy.max_retries => return Err(e),
            Err(e) => {
                let Some(mut delay) = backoff.next() else {
                    return Err(e);
                };
                if let Some(secs) = e.retry_after() {
                    delay = Duration::from_secs(secs).min(policy.max_backoff);
                }

                counter!("tierguard_source_retries_total", "operation" => operation_name.to_string())
                    .increment(1);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying source call"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
