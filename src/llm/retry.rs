//! Bounded retry for transport-level failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// How many times a failed transport attempt is repeated, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` means a single attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each following one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based), with up to 25% jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << retry.saturating_sub(1).min(16));
        let jitter_ms = (exp.as_millis() as u64) / 4;
        if jitter_ms == 0 {
            return exp;
        }
        exp + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Outcome of [`run`] when every attempt failed.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// `op` must only return errors that are worth repeating; application-level
/// failures belong in its `Ok` value.
pub async fn run<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, Exhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt > policy.max_retries => {
                return Err(Exhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transport failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, Exhausted<String>> = run(&fast(3), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("connection reset".to_string())
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Exhausted<String>> = run(&fast(2), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("attempt {attempt} failed")) }
        })
        .await;
        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.last_error, "attempt 3 failed");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Exhausted<String>> = run(&fast(0), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("nope".to_string()) }
        })
        .await;
        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_grows() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
        };
        let first = policy.delay_for(1);
        let third = policy.delay_for(3);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(125));
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(500));
    }
}
