//! Retry policies for failed page fetches.
//!
//! Transport failures and server errors are budgeted separately. Failures are
//! counted per offset and the counters reset after any successful page.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated at one offset; 0 retries forever
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Immediate retries without any ceiling
    pub const fn unlimited() -> Self {
        Self {
            max_attempts: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter_ms: 0,
        }
    }

    /// Immediate retries, giving up after `max_attempts` failures
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter_ms: 0,
        }
    }

    pub const fn is_exhausted(&self, failures: u32) -> bool {
        self.max_attempts != 0 && failures >= self.max_attempts
    }

    /// Backoff before the retry following the `failures`-th failure
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(32) as i32;
        let scaled = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay_ms as f64) as u64;
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            fastrand::u64(0..=self.jitter_ms)
        };
        Duration::from_millis(capped + jitter)
    }

    pub fn validate(&self, name: &str) -> Result<(), String> {
        if self.backoff_multiplier < 1.0 {
            return Err(format!("retry.{name}.backoff_multiplier must be >= 1.0"));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(format!(
                "retry.{name}.base_delay_ms cannot be greater than max_delay_ms"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicies {
    pub transport: RetryPolicy,
    pub server_error: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            transport: RetryPolicy::default(),
            server_error: RetryPolicy {
                max_attempts: 5,
                base_delay_ms: 1_000,
                max_delay_ms: 60_000,
                backoff_multiplier: 2.0,
                jitter_ms: 500,
            },
        }
    }
}

impl RetryPolicies {
    pub fn validate(&self) -> Result<(), String> {
        self.transport.validate("transport")?;
        self.server_error.validate("server_error")
    }
}
