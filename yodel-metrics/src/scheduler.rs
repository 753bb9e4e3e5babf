//! Scheduler metrics

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

use crate::MetricsError;

#[derive(Debug)]
pub struct SchedulerMetrics {
    /// Due items found per poll, by job type
    discovered_total: Counter<u64>,

    /// Items executed, by job type and outcome
    executed_total: Counter<u64>,

    /// Items another poller already claimed
    claimed_elsewhere_total: Counter<u64>,

    /// Seconds between an item's due time and its execution
    lag_seconds: Histogram<f64>,
}

impl SchedulerMetrics {
    /// # Errors
    ///
    /// Returns an error if metric instruments cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let meter = meter();

        let discovered_total = meter
            .u64_counter("yodel.scheduler.discovered.total")
            .with_description("Due items found within the grace window")
            .build();

        let executed_total = meter
            .u64_counter("yodel.scheduler.executed.total")
            .with_description("Scheduled items executed by outcome")
            .build();

        let claimed_elsewhere_total = meter
            .u64_counter("yodel.scheduler.claimed_elsewhere.total")
            .with_description("Due items skipped because they were no longer scheduled")
            .build();

        let lag_seconds = meter
            .f64_histogram("yodel.scheduler.lag.seconds")
            .with_description("Delay between due time and execution")
            .build();

        Ok(Self {
            discovered_total,
            executed_total,
            claimed_elsewhere_total,
            lag_seconds,
        })
    }

    pub fn record_discovered(&self, job_type: &str, count: u64) {
        if count > 0 {
            self.discovered_total
                .add(count, &[KeyValue::new("job_type", job_type.to_string())]);
        }
    }

    pub fn record_executed(&self, job_type: &str, outcome: &str, lag_secs: f64) {
        let job_type = KeyValue::new("job_type", job_type.to_string());
        self.lag_seconds
            .record(lag_secs, std::slice::from_ref(&job_type));
        self.executed_total
            .add(1, &[job_type, KeyValue::new("outcome", outcome.to_string())]);
    }

    pub fn record_claimed_elsewhere(&self, job_type: &str) {
        self.claimed_elsewhere_total
            .add(1, &[KeyValue::new("job_type", job_type.to_string())]);
    }
}

fn meter() -> Meter {
    opentelemetry::global::meter("yodel.scheduler")
}
