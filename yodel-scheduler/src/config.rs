use std::time::Duration;

use serde::Deserialize;

const fn default_grace_secs() -> u64 {
    300
}

const fn default_poll_interval_secs() -> u64 {
    30
}

fn default_schedule() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// How long after its due time an item is still executed. Older items
    /// are missed for good.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,

    /// Longest sleep between polls, whatever the next due time
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Name of the schedule this process executes
    #[serde(default = "default_schedule")]
    pub schedule: String,
}

impl SchedulerConfig {
    pub const fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            grace_secs: default_grace_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            schedule: default_schedule(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_defaults_fill_missing_fields() {
        let config: SchedulerConfig = ron::from_str("(grace_secs: 60)").unwrap();

        assert_eq!(config.grace(), Duration::from_secs(60));
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.schedule, "default");
    }
}
