//! Retry policy for remote calls.
//!
//! Routing, geocoding and replanning go through a [`RetryPolicy`] instead of
//! inline sleep loops. The policy is a value: callers pick one from config
//! and pass it to whatever performs the call.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use navcast::retry::RetryPolicy;
//!
//! let policy = RetryPolicy::fixed(3, Duration::ZERO);
//! let mut calls = 0;
//! let result: Result<u32, &str> = policy.run("lookup", |_| {
//!     calls += 1;
//!     if calls < 3 { Err("busy") } else { Ok(42) }
//! });
//! assert_eq!(result, Ok(42));
//! ```

use std::fmt::Display;
use std::time::Duration;

use tracing::{debug, warn};

/// Default number of attempts for remote calls.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay between attempts (1 second).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// How a remote call handles transient failures.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryPolicy {
    /// No retries - fail immediately on error.
    None,

    /// Fixed number of attempts with constant delay between them.
    Fixed {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Delay between attempts.
        delay: Duration,
    },
}

impl Default for RetryPolicy {
    /// Three attempts, one second apart.
    fn default() -> Self {
        Self::Fixed {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Fixed delay between a bounded number of attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed {
            max_attempts,
            delay,
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` when the
    /// attempt budget is spent.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Fixed {
                max_attempts,
                delay,
            } => (attempt < *max_attempts).then_some(*delay),
        }
    }

    /// Maximum number of attempts, never less than one.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. } => (*max_attempts).max(1),
        }
    }

    /// Run `operation` until it succeeds or the budget is spent.
    ///
    /// The closure receives the 1-based attempt number. Delays are slept on
    /// the calling thread, so call this from a blocking context.
    pub fn run<T, E, F>(&self, operation: &str, mut call: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            match call(attempt) {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => match self.delay_for_attempt(attempt) {
                    Some(delay) if attempt < max_attempts => {
                        warn!(
                            operation,
                            attempt,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Attempt failed, retrying"
                        );
                        if !delay.is_zero() {
                            std::thread::sleep(delay);
                        }
                        attempt += 1;
                    }
                    _ => {
                        warn!(operation, attempts = attempt, error = %e, "Giving up");
                        return Err(e);
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_three_fixed_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for_attempt(3), None);
    }

    #[test]
    fn test_none_policy() {
        assert_eq!(RetryPolicy::None.max_attempts(), 1);
        assert_eq!(RetryPolicy::None.delay_for_attempt(1), None);
    }

    #[test]
    fn test_run_stops_after_budget() {
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let mut attempts = Vec::new();
        let result: Result<(), String> = policy.run("test", |n| {
            attempts.push(n);
            Err(format!("failure {}", n))
        });
        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(attempts, vec![1, 2, 3]);
    }

    #[test]
    fn test_run_returns_first_success() {
        let policy = RetryPolicy::fixed(5, Duration::ZERO);
        let mut calls = 0;
        let result: Result<&str, &str> = policy.run("test", |_| {
            calls += 1;
            if calls == 2 {
                Ok("done")
            } else {
                Err("busy")
            }
        });
        assert_eq!(result, Ok("done"));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_zero_attempts_still_calls_once() {
        let policy = RetryPolicy::fixed(0, Duration::ZERO);
        let mut calls = 0;
        let _: Result<(), &str> = policy.run("test", |_| {
            calls += 1;
            Err("nope")
        });
        assert_eq!(calls, 1);
    }
}
