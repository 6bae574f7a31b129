use std::future::Future;

use crate::options::RetryPolicy;

/// Runs `attempt` until it succeeds or the policy's attempts are spent,
/// sleeping `policy.interval` between attempts. Returns the last error.
pub(crate) async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts();
    let mut tried = 1;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if tried >= attempts => return Err(err),
            Err(_) => {
                tracing::trace!(attempt = tried, of = attempts, "retrying");
                tried += 1;
                if !policy.interval.is_zero() {
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_total_attempts() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<(), u32> = retry(&RetryPolicy::new(3, Duration::from_millis(100)), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(n) }
        })
        .await;

        assert_eq!(result, Err(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_success() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, ()> = retry(&RetryPolicy::new(5, Duration::from_millis(10)), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { if n == 2 { Ok(n) } else { Err(()) } }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_times_is_one_attempt() {
        let calls = AtomicU32::new(0);

        let result: Result<(), ()> = retry(&RetryPolicy::new(0, Duration::from_millis(10)), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
