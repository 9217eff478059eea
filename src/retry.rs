//! Bounded retry with exponential backoff for remote service calls.

use std::fmt::Display;
use std::time::Duration;
use tracing::warn;

use crate::config::RetryConfig;

/// Errors that may succeed if the call is simply repeated.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub backoff_factor: u32,
    /// Whole-request timeout handed to HTTP clients
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            backoff_factor: config.backoff_factor.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            backoff_factor: 1,
            timeout: Duration::from_secs(15),
        }
    }

    /// Runs `op`, repeating it on transient errors up to `max_retries` times.
    pub fn run<T, E, F>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        E: Transient + Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "transient failure, retrying in {:?}",
                        backoff
                    );
                    std::thread::sleep(backoff);
                    backoff *= self.backoff_factor;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    enum TestError {
        Flaky,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Flaky)
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            ..RetryPolicy::no_retry()
        }
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result: Result<u32, TestError> = fast_policy(2).run("test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 { Err(TestError::Flaky) } else { Ok(7) }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let calls = Cell::new(0);
        let result: Result<u32, TestError> = fast_policy(2).run("test", || {
            calls.set(calls.get() + 1);
            Err(TestError::Flaky)
        });
        assert!(matches!(result, Err(TestError::Flaky)));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_permanent_error_not_retried() {
        let calls = Cell::new(0);
        let result: Result<u32, TestError> = fast_policy(5).run("test", || {
            calls.set(calls.get() + 1);
            Err(TestError::Fatal)
        });
        assert!(matches!(result, Err(TestError::Fatal)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from_config(&RetryConfig::default());
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.initial_backoff, Duration::from_millis(500));
        assert_eq!(policy.timeout, Duration::from_secs(15));
    }
}
