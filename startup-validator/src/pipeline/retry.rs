//! Retry policy for transient stage failures.
//!
//! Exponential backoff capped at a maximum delay, with optional jitter so
//! concurrent runs do not hammer a throttled provider in lockstep.

use crate::config::RetrySettings;
use crate::core::StageOutput;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Jitter applied on top of the backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// Exact backoff delays.
    None,
    /// Random from 0 to delay.
    Full,
    /// Half fixed, half random.
    #[default]
    Equal,
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No attempts left.
    GiveUp,
    /// The failure is permanent.
    NotRetryable,
}

/// How often and how patiently a stage is retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Delay cap, in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter strategy.
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay_ms: settings.base_delay_ms,
            max_delay_ms: settings.max_delay_ms,
            jitter: JitterStrategy::Equal,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Backoff delay after `attempt` failed attempts (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent))
            .min(self.max_delay_ms);

        let jittered = match self.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };
        Duration::from_millis(jittered)
    }

    /// Decides what to do after `attempt` attempts ended with `output`.
    #[must_use]
    pub fn decide(&self, attempt: u32, output: &StageOutput) -> RetryDecision {
        if !output.is_retryable() {
            RetryDecision::NotRetryable
        } else if attempt >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.delay_for(attempt))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact() -> RetryPolicy {
        RetryPolicy::default()
            .with_base_delay_ms(100)
            .with_jitter(JitterStrategy::None)
    }

    #[test]
    fn test_defaults_follow_settings() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 500);
        assert_eq!(policy.max_delay_ms, 10_000);
    }

    #[test]
    fn test_exponential_delays_are_capped() {
        let policy = exact();
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(40), Duration::from_millis(10_000));
    }

    #[test]
    fn test_equal_jitter_stays_in_range() {
        let policy = RetryPolicy::default().with_base_delay_ms(1000);
        for _ in 0..50 {
            let delay = policy.delay_for(1).as_millis();
            assert!((500..=1000).contains(&delay));
        }
    }

    #[test]
    fn test_decide() {
        let policy = exact();
        let transient = StageOutput::fail_retryable("429");
        let permanent = StageOutput::fail("bad request");

        assert_eq!(policy.decide(1, &transient), RetryDecision::Retry(Duration::from_millis(100)));
        assert_eq!(policy.decide(3, &transient), RetryDecision::GiveUp);
        assert_eq!(policy.decide(1, &permanent), RetryDecision::NotRetryable);
    }

    #[test]
    fn test_no_retry() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.decide(1, &StageOutput::fail_retryable("x")), RetryDecision::GiveUp);
    }
}
