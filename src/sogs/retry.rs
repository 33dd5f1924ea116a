//! Poll cycle retry with capped exponential backoff.
//!
//! A failed cycle is retried wholesale; there is no per-request retry.
//! After `n` consecutive network failures the scheduler waits
//! `min(base * 2^(n-1), cap)` instead of the normal poll interval.

use super::traits::SogsError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default first backoff (matches the poll interval).
const DEFAULT_BASE_MS: u64 = 3_500;

/// Default backoff ceiling (5 minutes).
const DEFAULT_CAP_MS: u64 = 300_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// First backoff delay in milliseconds
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,

    /// Upper bound on any backoff delay in milliseconds
    #[serde(default = "default_cap_ms")]
    pub cap_ms: u64,
}

fn default_base_ms() -> u64 {
    DEFAULT_BASE_MS
}

fn default_cap_ms() -> u64 {
    DEFAULT_CAP_MS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_ms: DEFAULT_BASE_MS,
            cap_ms: DEFAULT_CAP_MS,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next cycle after `failures` consecutive failures.
    ///
    /// `failures` must be at least 1; 0 is treated as 1.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(32);
        let factor = 1u64 << exponent;
        let ms = self.base_ms.saturating_mul(factor).min(self.cap_ms);
        Duration::from_millis(ms)
    }
}

/// Only network failures are worth retrying; everything else is a bug or
/// a configuration problem that a retry will not fix.
pub fn is_retryable(err: &SogsError) -> bool {
    matches!(err, SogsError::Network(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyError;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            base_ms: 1_000,
            cap_ms: 60_000,
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(6), Duration::from_secs(32));
    }

    #[test]
    fn test_backoff_capped() {
        let policy = RetryPolicy {
            base_ms: 1_000,
            cap_ms: 60_000,
        };
        assert_eq!(policy.delay_for(7), Duration::from_secs(60));
        assert_eq!(policy.delay_for(500), Duration::from_secs(60));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_failures_treated_as_first() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), policy.delay_for(1));
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&SogsError::Network("timeout".into())));
        assert!(!is_retryable(&SogsError::Protocol("bad json".into())));
        assert!(!is_retryable(&SogsError::Cancelled));
        assert!(!is_retryable(&SogsError::InvalidKey(KeyError::InvalidKey(
            "short".into()
        ))));
    }
}
