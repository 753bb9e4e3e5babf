use serde::Deserialize;

use crate::{queue::QueueConfig, transport::TransportsConfig};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub fanout: FanoutConfig,

    #[serde(default)]
    pub sms_guard: SmsGuardConfig,

    #[serde(default)]
    pub transports: TransportsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FanoutConfig {
    /// Recipients turned into children per bulk insert
    #[serde(default = "defaults::buffer_size")]
    pub buffer_size: usize,

    /// Concurrent submissions to the job queue
    #[serde(default = "defaults::pool_size")]
    pub pool_size: usize,

    /// Fan-outs larger than this go to a lane of the sender's own
    #[serde(default = "defaults::custom_lane_threshold")]
    pub custom_lane_threshold: usize,

    /// Broadcast children per push partition job
    #[serde(default = "defaults::partition_size")]
    pub partition_size: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            buffer_size: defaults::buffer_size(),
            pool_size: defaults::pool_size(),
            custom_lane_threshold: defaults::custom_lane_threshold(),
            partition_size: defaults::partition_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsGuardConfig {
    #[serde(default = "defaults::sms_guard_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for SmsGuardConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::sms_guard_ttl_secs(),
        }
    }
}

mod defaults {
    pub const fn buffer_size() -> usize {
        500
    }

    pub const fn pool_size() -> usize {
        20
    }

    pub const fn custom_lane_threshold() -> usize {
        10_000
    }

    pub const fn partition_size() -> usize {
        100
    }

    pub const fn sms_guard_ttl_secs() -> u64 {
        3_600
    }
}
