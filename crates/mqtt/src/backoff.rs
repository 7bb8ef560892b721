//! Fixed-delay reconnect policy.
//!
//! Once the first connection succeeded, every lost connection is retried after
//! the same configured delay. A sensor node talks to a single broker, so there
//! is no herd to spread out and a constant delay keeps the gap in published
//! data predictable.
//!
//! ```ignore
//! use std::time::Duration;
//! use sensor_mqtt_broker::Backoff;
//!
//! let mut backoff = Backoff::new(Duration::from_secs(1), 0);
//! assert_eq!(backoff.next_sleep().unwrap(), Duration::from_secs(1));
//! assert_eq!(backoff.next_sleep().unwrap(), Duration::from_secs(1));
//! backoff.reset();
//! ```

use std::time::Duration;

use thiserror::Error;

/// Error type for backoff exhaustion.
#[derive(Debug, Error)]
pub enum BackoffError {
    /// Maximum retry attempts exceeded with the given limit.
    #[error("Maximum number of attempts exceeded: {0}")]
    MaxAttemptLimitError(u32),
}

/// Reconnect delay controller.
///
/// Counts consecutive failed attempts since the last successful connection.
/// The counter resets on every CONNACK.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Delay returned for every attempt.
    delay: Duration,

    /// Consecutive attempts since the last reset.
    attempt: u32,

    /// Hard limit on consecutive attempts. `0` retries forever.
    max_attempts: u32,
}

impl Backoff {
    /// Creates a controller that always waits `delay`.
    ///
    /// `max_attempts == 0` disables the limit.
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            attempt: 0,
            max_attempts,
        }
    }

    /// Starts counting from zero again. Call after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Returns the delay before the next attempt and advances the counter.
    ///
    /// # Errors
    /// `BackoffError::MaxAttemptLimitError` once the limit is exceeded.
    pub fn next_sleep(&mut self) -> Result<Duration, BackoffError> {
        self.attempt = self.attempt.saturating_add(1);

        if self.max_attempts != 0 && self.attempt > self.max_attempts {
            return Err(BackoffError::MaxAttemptLimitError(self.max_attempts));
        }

        Ok(self.delay)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for Backoff {
    /// One second between attempts, retried forever.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_default_creation() {
        let backoff = Backoff::default();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.delay(), Duration::from_secs(1));
        assert_eq!(backoff.max_attempts(), 0);
    }

    #[test]
    fn test_backoff_delay_is_constant() {
        let mut backoff = Backoff::new(Duration::from_millis(250), 0);

        for _ in 0..10 {
            assert_eq!(backoff.next_sleep().unwrap(), Duration::from_millis(250));
        }
        assert_eq!(backoff.attempt(), 10);
    }

    #[test]
    fn test_backoff_unlimited_never_errors() {
        let mut backoff = Backoff::new(Duration::from_secs(1), 0);
        for _ in 0..1000 {
            assert!(backoff.next_sleep().is_ok());
        }
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::default();

        backoff.next_sleep().unwrap();
        backoff.next_sleep().unwrap();
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_sleep().unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_max_attempts_exceeded() {
        let mut backoff = Backoff::new(Duration::from_secs(1), 2);

        assert!(backoff.next_sleep().is_ok());
        assert!(backoff.next_sleep().is_ok());
        let result = backoff.next_sleep();

        assert!(matches!(result, Err(BackoffError::MaxAttemptLimitError(2))));
    }

    #[test]
    fn test_backoff_reset_restores_budget() {
        let mut backoff = Backoff::new(Duration::from_secs(1), 1);

        assert!(backoff.next_sleep().is_ok());
        assert!(backoff.next_sleep().is_err());

        backoff.reset();
        assert!(backoff.next_sleep().is_ok());
    }
}
