//! Retry policy shared by the metadata and archive fetchers.
//!
//! Both network components retry transient failures with the same linear
//! backoff: after failed attempt `n` the caller sleeps `n × step` before
//! trying again. The policy is a value type, and sleeping is delegated to a
//! [`Sleeper`] so tests can observe the schedule without waiting.

use std::time::Duration;

/// Default number of attempts for network operations.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff step; attempt `n` waits `n × step`.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(2);

/// Blocks the current thread between attempts.
#[cfg_attr(test, mockall::automock)]
pub trait Sleeper {
    /// Pause for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Bounded retry with linear backoff.
///
/// # Examples
///
/// ```
/// use desktop_packager::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts(), 3);
/// assert_eq!(policy.backoff(1), Duration::from_secs(2));
/// assert_eq!(policy.backoff(2), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    step: Duration,
}

/// The outcome of a retried operation that never succeeded.
#[derive(Debug)]
pub struct Exhausted<E> {
    /// How many attempts were made.
    pub attempts: u32,
    /// The error from the final attempt.
    pub last_error: E,
}

impl RetryPolicy {
    /// Create a policy. A `max_attempts` of zero is treated as one.
    #[must_use]
    pub const fn new(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            step,
        }
    }

    /// Return the total attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Return the delay after failed attempt `attempt` (1-based).
    #[must_use]
    pub const fn backoff(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt)
    }

    /// Run `operation` until it succeeds or the budget is spent.
    ///
    /// The closure receives the 1-based attempt number. No sleep follows the
    /// final attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Exhausted`] carrying the last error once every attempt has
    /// failed.
    pub fn run<T, E>(
        &self,
        sleeper: &dyn Sleeper,
        mut operation: impl FnMut(u32) -> Result<T, E>,
    ) -> Result<T, Exhausted<E>>
    where
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => {
                    return Err(Exhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                Err(err) => {
                    let delay = self.backoff(attempt);
                    log::debug!(
                        "attempt {attempt}/{} failed: {err}; retrying in {}s",
                        self.max_attempts,
                        delay.as_secs()
                    );
                    sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BACKOFF_STEP)
    }
}
