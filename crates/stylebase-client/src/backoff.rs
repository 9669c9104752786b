use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// The one bounded-retry policy shared by every call site that retries
/// (account ensure, balance fetch). Attempt 0 runs immediately; each
/// subsequent attempt waits an exponentially grown, jittered delay.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_ms: u64,
    pub factor: f64,
    pub jitter: f64,
    pub cap_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_ms: 250,
            factor: 2.0,
            jitter: 0.2,
            cap_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    pub fn next_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = (attempt - 1) as f64;
        let mut delay = (self.base_ms as f64) * self.factor.powf(exp);
        if delay > self.cap_ms as f64 {
            delay = self.cap_ms as f64;
        }
        if self.jitter > 0.0 {
            let mut rng = rand::thread_rng();
            let jitter = rng.gen_range(-(self.jitter)..self.jitter);
            delay *= 1.0 + jitter;
            if delay < 0.0 {
                delay = self.base_ms as f64;
            }
        }
        Duration::from_millis(delay.round() as u64)
    }

    /// Runs `op` until it succeeds, fails non-retryably, or the attempt
    /// budget is spent. The last error is returned as-is.
    pub async fn run<T, E, F, Fut, R>(&self, mut op: F, is_retryable: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            let delay = self.next_delay(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !is_retryable(&err) {
                        return Err(err);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn first_attempt_has_no_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(0), Duration::ZERO);
    }

    #[test]
    fn delays_grow_up_to_the_cap() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.next_delay(1), Duration::from_millis(250));
        assert_eq!(policy.next_delay(2), Duration::from_millis(500));
        assert_eq!(policy.next_delay(20), Duration::from_millis(5_000));
    }

    #[tokio::test]
    async fn run_stops_at_the_attempt_budget() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_ms: 1,
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = policy
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("nope") }
                },
                |_| true,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_does_not_retry_permanent_failures() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = policy
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("fatal") }
                },
                |_| false,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
