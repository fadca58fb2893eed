/// Retry policy with bounded attempts and backoff between them
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for retried operations
///
/// Mirrors the usual client-side optimistic concurrency defaults: a handful of
/// attempts with a short, lightly jittered delay between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay, in milliseconds
    pub max_delay_ms: u64,

    /// Growth factor applied to the delay after each attempt
    pub backoff_multiplier: f64,

    /// Fraction of random spread applied to each delay (0.0 disables jitter)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 10,
            max_delay_ms: 1_000,
            backoff_multiplier: 1.0,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    /// Validate the retry settings
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if self.backoff_multiplier < 1.0 {
            anyhow::bail!(
                "retry.backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            );
        }
        if !(0.0..1.0).contains(&self.jitter) {
            anyhow::bail!("retry.jitter must be in [0.0, 1.0), got {}", self.jitter);
        }
        Ok(())
    }

    /// Delay to wait after the given failed attempt (1-based), before jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_delay_ms as f64) as u64)
    }

    /// Delay to wait after the given failed attempt (1-based), with jitter applied
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let factor = rand::thread_rng().gen_range((1.0 - self.jitter)..(1.0 + self.jitter));
        Duration::from_secs_f64(base.as_secs_f64() * factor)
    }
}
