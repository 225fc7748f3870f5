// Backoff for throttled or unreachable vault requests

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the request executor backs off after a 429, a 5xx or a broken
/// connection.
///
/// Only single requests are retried. A poll or page fetch that still fails
/// after the last retry surfaces its error to the caller, which leaves the
/// operation handle or page cursor where it was.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries allowed after the first request; zero disables retrying.
    pub max_retries: u32,
    /// Wait before the first retry. Each further retry doubles it.
    pub base_delay: Duration,
    /// Upper bound on the doubled wait, applied before jitter. Also caps a
    /// server's `Retry-After`.
    pub delay_ceiling: Duration,
    /// Spread each wait uniformly over 75%..=125% of its nominal value.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(800), Duration::from_secs(60))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, delay_ceiling: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            delay_ceiling,
            jitter: true,
        }
    }

    /// Policy that never retries. Used where a test wants to see the
    /// first failure.
    ///
    /// ```
    /// use keyvault_sdk::client::RetryPolicy;
    ///
    /// let policy = RetryPolicy::disabled();
    /// assert!(!policy.allows_retry(0));
    /// ```
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Same policy with deterministic waits.
    pub fn without_jitter(self) -> Self {
        Self {
            jitter: false,
            ..self
        }
    }

    /// Whether a request that has already been retried `retries_done`
    /// times may be sent again.
    pub fn allows_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Wait before retry number `retry` (1-based). `0` means the first
    /// request, which is sent at once.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let Some(doublings) = retry.checked_sub(1) else {
            return Duration::ZERO;
        };

        let nominal = self
            .base_delay
            .checked_mul(2u32.saturating_pow(doublings))
            .map_or(self.delay_ceiling, |d| d.min(self.delay_ceiling));

        if self.jitter {
            nominal.mul_f64(rand::thread_rng().gen_range(0.75..=1.25))
        } else {
            nominal
        }
    }
}

/// Reads a `Retry-After` header sent with a throttled response.
///
/// The vault normally sends whole seconds; an HTTP date is also accepted.
/// Anything unparseable, or a date that has already passed, yields `None`
/// so the caller falls back to its own backoff.
pub fn parse_retry_after(header: &str) -> Option<Duration> {
    let header = header.trim();
    match header.parse::<u64>() {
        Ok(seconds) => Some(Duration::from_secs(seconds)),
        Err(_) => {
            let at = DateTime::parse_from_rfc2822(header).ok()?.with_timezone(&Utc);
            (at - Utc::now()).to_std().ok().filter(|wait| !wait.is_zero())
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
