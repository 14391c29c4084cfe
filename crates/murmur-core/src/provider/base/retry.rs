//! Retry policy for transient provider faults.
//!
//! Exponential backoff with full jitter; the delay for attempt `n` is drawn
//! uniformly from the upper half of `min(base * 2^(n-1), cap)`.

use std::time::Duration;

use rand::Rng;

use crate::configuration::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_SECS, DEFAULT_RETRY_MAX_DELAY_SECS,
};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum provider attempts per chunk (first try included)
    pub max_attempts: u32,
    /// Base delay, doubled with each failed attempt
    pub base_delay: Duration,
    /// Cap on the computed delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(DEFAULT_RETRY_BASE_DELAY_SECS),
            max_delay: Duration::from_secs(DEFAULT_RETRY_MAX_DELAY_SECS),
        }
    }
}

impl RetryConfig {
    /// Jittered delay before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let raw = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);
        // Full jitter over the upper half keeps retries spread out without
        // collapsing the delay to near zero.
        let jittered = raw.mul_f64(rand::thread_rng().gen_range(0.5..=1.0));
        jittered.min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_growth_and_cap() {
        let config = RetryConfig::default();
        for attempt in 1..=10 {
            let ceiling = Duration::from_secs(2)
                .saturating_mul(2u32.saturating_pow(attempt - 1))
                .min(config.max_delay);
            for _ in 0..20 {
                let delay = config.delay_for_attempt(attempt);
                assert!(delay <= ceiling, "attempt {attempt}: {delay:?} > {ceiling:?}");
                assert!(
                    delay >= ceiling.mul_f64(0.5),
                    "attempt {attempt}: {delay:?} under jitter floor"
                );
            }
        }
    }

    #[test]
    fn test_delay_never_exceeds_cap() {
        let config = RetryConfig::default();
        let delay = config.delay_for_attempt(30);
        assert!(delay <= config.max_delay);
    }
}
