//! Exponential backoff for rate-limit responses
//!
//! The delay doubles on every consecutive rate-limit response, starting at
//! the floor. Each wait adds uniform jitter in `[0, max_jitter]`. Once the
//! next doubled delay would pass the ceiling there is no further delay to
//! give, and the caller has to treat the session as unrecoverable.

use crate::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Doubling backoff with jitter and a hard ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    floor: Duration,
    ceiling: Duration,
    max_jitter: Duration,
}

impl BackoffPolicy {
    pub fn new(floor: Duration, ceiling: Duration, max_jitter: Duration) -> Self {
        Self {
            floor,
            ceiling: ceiling.max(floor),
            max_jitter,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.backoff_floor(),
            config.backoff_ceiling(),
            config.max_jitter(),
        )
    }

    /// Returns the delay a fresh session starts from
    pub fn reset(&self) -> Duration {
        self.floor
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Returns the delay that follows `previous`
    ///
    /// `None` means doubling would pass the ceiling.
    ///
    /// # Examples
    ///
    /// ```
    /// use serp_harvest::search::BackoffPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = BackoffPolicy::new(
    ///     Duration::from_secs(5),
    ///     Duration::from_secs(80),
    ///     Duration::from_secs(1),
    /// );
    /// assert_eq!(policy.next_delay(Duration::from_secs(5)), Some(Duration::from_secs(10)));
    /// assert_eq!(policy.next_delay(Duration::from_secs(40)), Some(Duration::from_secs(80)));
    /// assert_eq!(policy.next_delay(Duration::from_secs(80)), None);
    /// ```
    pub fn next_delay(&self, previous: Duration) -> Option<Duration> {
        let doubled = previous.checked_mul(2)?.max(self.floor);
        if doubled > self.ceiling {
            None
        } else {
            Some(doubled)
        }
    }

    /// Adds random jitter to `delay`, never going above the ceiling
    pub fn jittered(&self, delay: Duration) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        (delay + jitter).min(self.ceiling)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
