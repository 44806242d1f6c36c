//! §5 retry discipline: exponential backoff with jitter and a 3-attempt cap
//! around provider calls. Two windows — a short one for extractor/media
//! calls, a longer one for embeddings — both built the same way.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};

const MAX_ATTEMPTS: usize = 3;

fn strategy(floor: Duration, ceiling: Duration) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(floor.as_millis() as u64)
        .max_delay(ceiling)
        .map(jitter)
        .take(MAX_ATTEMPTS - 1)
}

/// Whether an error looks like a transient, retry-worthy provider failure
/// (rate limiting) as opposed to a permanent one (bad request, auth, parse
/// failure). Generic errors are not retried, per §5.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("429")
        || msg.contains("rate limit")
        || msg.contains("too many requests")
        || msg.contains("timed out")
        || msg.contains("timeout")
        || msg.contains("503")
        || msg.contains("connection reset")
}

/// 5-30s window, for extractor and media-describer calls.
pub async fn with_extractor_retry<T, F, Fut>(op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    run(strategy(Duration::from_secs(5), Duration::from_secs(30)), op).await
}

/// 15-60s window, for embeddings calls.
pub async fn with_embedding_retry<T, F, Fut>(op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    run(strategy(Duration::from_secs(15), Duration::from_secs(60)), op).await
}

async fn run<T, F, Fut>(strategy: impl Iterator<Item = Duration>, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_err = None;
    let mut attempt = 0;
    let mut delays = strategy;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                let retryable = is_retryable(&e);
                last_err = Some(e);
                if !retryable || attempt >= MAX_ATTEMPTS {
                    break;
                }
                if let Some(delay) = delays.next() {
                    tokio::time::sleep(delay).await;
                } else {
                    break;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("retry loop exited with no error recorded")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_transient_errors_up_to_cap() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let result: Result<()> = with_extractor_retry(|| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("429 rate limit exceeded")
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_transient_errors() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let result: Result<()> = with_extractor_retry(|| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("invalid document: malformed PDF header")
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_works() {
        let result = with_embedding_retry(|| async { Ok::<_, anyhow::Error>(42) }).await.unwrap();
        assert_eq!(result, 42);
    }
}
