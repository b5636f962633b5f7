//! Bounded retries with exponential backoff.
//!
//! Attempts run strictly one after another. Between a failed attempt and the
//! next one the task is suspended on a tokio timer, so other work on the
//! runtime keeps making progress.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// An exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// The delay before the first retry
    pub delay: Duration,

    /// The factor the delay grows by after each failed attempt
    pub exponent: u32,

    /// The upper bound for any single delay
    pub max_delay: Duration,
}

impl Backoff {
    /// Create a new backoff schedule.
    pub fn new(delay: Duration, exponent: u32, max_delay: Duration) -> Self {
        Self {
            delay,
            exponent,
            max_delay,
        }
    }

    /// Doubling backoff starting at `delay`, capped at one minute.
    pub fn doubling(delay: Duration) -> Self {
        Self::new(delay, 2, Duration::from_secs(60))
    }

    /// Delay to wait after the given attempt (1-based) has failed.
    ///
    /// `delay * exponent^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let power = attempt.saturating_sub(1);
        self.exponent
            .checked_pow(power)
            .and_then(|factor| self.delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::doubling(Duration::from_millis(1000))
    }
}

/// The total number of attempts an operation may make, including the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempts(u32);

impl Attempts {
    /// Create a new attempt budget. A budget of zero still makes one attempt.
    pub fn new(n: u32) -> Self {
        Self(n.max(1))
    }

    /// The number of attempts in this budget.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for Attempts {
    fn default() -> Self {
        Self(3)
    }
}

impl From<u32> for Attempts {
    fn from(n: u32) -> Self {
        Self::new(n)
    }
}

/// Every attempt in the budget failed.
#[derive(Debug, Error)]
#[error("Failed after {attempts} attempts. Last error: {last}")]
pub struct Exhausted<E>
where
    E: fmt::Display + fmt::Debug,
{
    /// Number of attempts that were made.
    pub attempts: u32,

    /// The error from the final attempt.
    pub last: E,
}

/// Run `operation` until it succeeds or the attempt budget is spent.
///
/// The operation is handed the 1-based attempt number. After a failure with
/// attempts remaining, waits `backoff.delay_for_attempt(attempt)` before the
/// next call.
pub async fn retry<T, E, F, Fut>(
    attempts: Attempts,
    backoff: Backoff,
    mut operation: F,
) -> Result<T, Exhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display + fmt::Debug,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                tracing::warn!("Attempt {attempt} failed: {error}");

                if attempt >= attempts.get() {
                    return Err(Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }

                let delay = backoff.delay_for_attempt(attempt);
                tracing::info!("Retrying in {}ms...", delay.as_millis());
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use tokio::time::Instant;

    use super::*;

    #[test]
    fn default_delays_are_1_2_4() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn delay_respects_cap() {
        let backoff = Backoff::new(Duration::from_secs(1), 2, Duration::from_secs(5));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(backoff.delay_for_attempt(4), Duration::from_secs(5));
        assert_eq!(backoff.delay_for_attempt(200), Duration::from_secs(5));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(Attempts::new(0).get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = retry(Attempts::new(3), Backoff::default(), |attempt| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 3 {
                    Err(format!("boom {attempt}"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "slept {elapsed:?}");
        assert!(elapsed < Duration::from_millis(3100), "slept {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = retry(Attempts::new(3), Backoff::default(), |attempt| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("boom {attempt}"))
            }
        })
        .await;

        let error = result.unwrap_err();
        assert_eq!(error.attempts, 3);
        assert_eq!(error.last, "boom 3");
        assert_eq!(
            error.to_string(),
            "Failed after 3 attempts. Last error: boom 3"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_does_not_sleep() {
        let start = Instant::now();
        let result = retry(Attempts::default(), Backoff::default(), |_| async {
            Ok::<_, String>("done")
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}
