use std::time::Duration;

use serde::Deserialize;

use super::Lane;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct LaneConfig {
    /// Jobs of this lane running at once
    #[serde(default = "defaults::concurrency")]
    pub concurrency: usize,

    /// Per-attempt timeout
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl LaneConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::concurrency(),
            timeout_secs: defaults::timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Jobs that can be waiting before `enqueue` starts to wait
    #[serde(default = "defaults::capacity")]
    pub capacity: usize,

    /// Jobs taken off the queue and not yet finished, running or waiting for
    /// their lane. New jobs stay queued while this many are in flight.
    #[serde(default = "defaults::max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default)]
    pub default: LaneConfig,

    #[serde(default = "defaults::sms")]
    pub sms: LaneConfig,

    #[serde(default = "defaults::callbacks")]
    pub callbacks: LaneConfig,

    /// Fan-outs run apart from the children they create
    #[serde(default = "defaults::fanouts")]
    pub fanouts: LaneConfig,

    /// Applied to every per-sender lane
    #[serde(default = "defaults::sender")]
    pub sender: LaneConfig,
}

impl QueueConfig {
    pub const fn lane(&self, lane: &Lane) -> &LaneConfig {
        match lane {
            Lane::Default => &self.default,
            Lane::Sms => &self.sms,
            Lane::Callbacks => &self.callbacks,
            Lane::Fanout => &self.fanouts,
            Lane::Sender(_) => &self.sender,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::capacity(),
            max_in_flight: defaults::max_in_flight(),
            default: LaneConfig::default(),
            sms: defaults::sms(),
            callbacks: defaults::callbacks(),
            fanouts: defaults::fanouts(),
            sender: defaults::sender(),
        }
    }
}

mod defaults {
    use super::{LaneConfig, RetryPolicy};

    pub const fn capacity() -> usize {
        10_000
    }

    pub const fn max_in_flight() -> usize {
        1_000
    }

    pub const fn concurrency() -> usize {
        50
    }

    pub const fn timeout_secs() -> u64 {
        30
    }

    pub fn sms() -> LaneConfig {
        LaneConfig {
            concurrency: 10,
            ..LaneConfig::default()
        }
    }

    /// Callbacks swallow their own failures, so there is nothing to retry
    pub fn callbacks() -> LaneConfig {
        LaneConfig {
            concurrency: 20,
            timeout_secs: 10,
            retry: RetryPolicy::once(),
        }
    }

    pub fn fanouts() -> LaneConfig {
        LaneConfig {
            concurrency: 4,
            timeout_secs: 300,
            ..LaneConfig::default()
        }
    }

    pub fn sender() -> LaneConfig {
        LaneConfig {
            concurrency: 10,
            timeout_secs: 60,
            ..LaneConfig::default()
        }
    }
}
