//! Retry policy for delivery jobs.
//!
//! Delays grow exponentially from `base_delay_ms` up to `max_delay_ms`, with
//! `±jitter_factor` randomisation so a burst of failures doesn't come back
//! as a burst of retries.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts made before a job is handed to the failure hook
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled for every further one
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "defaults::jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
            jitter_factor: defaults::jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    #[must_use]
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether another attempt may follow `attempts` made so far
    #[must_use]
    pub const fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    #[must_use]
    pub const fn remaining_attempts(&self, attempts: u32) -> u32 {
        self.max_attempts.saturating_sub(attempts)
    }

    /// How long to wait after the `attempt`-th (1-based) failed attempt
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff(
            attempt,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_factor,
        )
    }
}

/// `min(base * 2^(attempt - 1), max) * (1 ± jitter)`
fn backoff(attempt: u32, base_ms: u64, max_ms: u64, jitter_factor: f64) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let delay = if exponent >= 63 {
        max_ms
    } else {
        base_ms.saturating_mul(1u64 << exponent).min(max_ms)
    };

    if jitter_factor <= 0.0 || delay == 0 {
        return Duration::from_millis(delay);
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let jittered = {
        let range = (delay as f64) * jitter_factor;
        let jitter: f64 = rand::rng().random_range(-range..=range);
        ((delay as f64) + jitter).max(0.0) as u64
    };

    Duration::from_millis(jittered)
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        5
    }

    pub const fn base_delay_ms() -> u64 {
        1_000
    }

    pub const fn max_delay_ms() -> u64 {
        60_000
    }

    pub const fn jitter_factor() -> f64 {
        0.2
    }
}
