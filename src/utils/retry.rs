//! Retry with multiplicative backoff.
//!
//! Every unreliable boundary in the system (transports, whole scrape
//! operations, store writes) runs behind one of the policies below. Delays
//! grow by a constant factor per failure, capped, with optional uniform
//! jitter added on top.

use std::future::Future;
use std::time::{Duration, SystemTime};

use tracing::debug;

/// A bounded retry schedule.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub tries: u32,
    /// Delay before the second attempt.
    pub delay: Duration,
    /// Multiplier applied to the delay after each failure.
    pub backoff: f64,
    /// Upper bound on the (pre-jitter) delay.
    pub max_delay: Duration,
    /// Uniform jitter range added to every delay.
    pub jitter: Option<(Duration, Duration)>,
}

impl RetryPolicy {
    /// Direct-transport schedule: 7 quick tries.
    pub const DIRECT_TRANSPORT: RetryPolicy = RetryPolicy {
        tries: 7,
        delay: Duration::from_millis(100),
        backoff: 1.2,
        max_delay: Duration::from_secs(4),
        jitter: None,
    };

    /// Outer schedule around the whole transport chain.
    pub const FETCH: RetryPolicy = RetryPolicy {
        tries: 3,
        delay: Duration::from_millis(500),
        backoff: 1.2,
        max_delay: Duration::from_secs(10),
        jitter: Some((Duration::from_millis(100), Duration::from_secs(3))),
    };

    /// Whole-operation schedule for index walking, thread materialization
    /// and title fetches.
    pub const SCRAPE_OP: RetryPolicy = RetryPolicy {
        tries: 10,
        delay: Duration::from_secs(5),
        backoff: 1.5,
        max_delay: Duration::from_secs(30),
        jitter: Some((Duration::from_millis(100), Duration::from_secs(3))),
    };

    /// Per-index-page task schedule.
    pub const INDEX_TASK: RetryPolicy = RetryPolicy {
        tries: 3,
        delay: Duration::from_millis(100),
        backoff: 1.5,
        max_delay: Duration::from_secs(30),
        jitter: Some((Duration::from_millis(100), Duration::from_secs(3))),
    };

    /// Store-write schedule, sized to ride out lock contention between
    /// writers sharing one file-backed database.
    pub const STORE: RetryPolicy = RetryPolicy {
        tries: 21,
        delay: Duration::from_millis(100),
        backoff: 1.2,
        max_delay: Duration::from_secs(4),
        jitter: None,
    };
}

/// Run `op` until it succeeds or the policy is exhausted, returning the
/// last error in the latter case.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = policy.delay;
    let mut attempt: u32 = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.tries => return Err(err),
            Err(err) => {
                let mut wait = delay;
                if let Some((lo, hi)) = policy.jitter {
                    wait += jitter_between(lo, hi);
                }
                debug!(
                    "attempt {}/{} failed ({}); retrying in {:?}",
                    attempt, policy.tries, err, wait
                );
                tokio::time::sleep(wait).await;

                let next = delay.as_secs_f64() * policy.backoff;
                delay = Duration::from_secs_f64(next.min(policy.max_delay.as_secs_f64()));
                attempt += 1;
            }
        }
    }
}

/// Uniform-ish duration in `[lo, hi]`, seeded from the clock's nanoseconds.
fn jitter_between(lo: Duration, hi: Duration) -> Duration {
    let span = hi.saturating_sub(lo);
    if span.is_zero() {
        return lo;
    }

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    lo + Duration::from_nanos((nanos % span.as_nanos()) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_returns_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            tries: 5,
            delay: Duration::from_millis(1),
            backoff: 1.0,
            max_delay: Duration::from_millis(1),
            jitter: None,
        };

        let result: Result<u32, &str> = retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("not yet")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            tries: 3,
            delay: Duration::from_millis(1),
            backoff: 1.0,
            max_delay: Duration::from_millis(1),
            jitter: None,
        };

        let result: Result<(), String> = retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(format!("failure {n}")) }
        })
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let lo = Duration::from_millis(100);
        let hi = Duration::from_secs(3);
        for _ in 0..32 {
            let j = jitter_between(lo, hi);
            assert!(j >= lo && j <= hi);
        }
    }
}
