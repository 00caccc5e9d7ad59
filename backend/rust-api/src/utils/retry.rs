use std::fmt::Display;
use std::time::Duration;

/// Bounded exponential backoff with jitter for storage round-trips.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_reads()
    }
}

impl RetryPolicy {
    pub fn for_reads() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(250),
            jitter_max: Some(Duration::from_millis(25)),
        }
    }

    /// Balance credits and game saves: a lost write loses money, so try harder.
    pub fn for_writes() -> Self {
        Self {
            max_attempts: 6,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(1000),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter_max: None,
        }
    }

    fn jittered(&self, backoff: Duration) -> Duration {
        match self.jitter_max {
            Some(jitter_max) if !jitter_max.is_zero() => {
                let jitter_ms = jitter_max.as_millis() as u64;
                backoff + Duration::from_millis(rand::random::<u64>() % (jitter_ms + 1))
            }
            _ => backoff,
        }
    }
}

pub async fn retry_async<F, Fut, T, E>(policy: &RetryPolicy, operation: &str, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    let mut backoff = policy.base_backoff;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.max_attempts => {
                tracing::error!(operation, attempt, error = %err, "Giving up after retries");
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(operation, attempt, error = %err, "Retrying after failure");
                tokio::time::sleep(policy.jittered(backoff)).await;
                backoff = std::cmp::min(backoff * 2, policy.max_backoff);
                attempt += 1;
            }
        }
    }
}
