//! Fan-out metrics

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

use crate::MetricsError;

#[derive(Debug)]
pub struct FanoutMetrics {
    /// Number of children created per fan-out
    recipients: Histogram<u64>,

    /// Wall time from first batch to the final count update
    duration_seconds: Histogram<f64>,

    /// Partition jobs submitted
    partitions_total: Counter<u64>,

    /// Children created already `sent` because the recipient muted the sender
    muted_total: Counter<u64>,
}

impl FanoutMetrics {
    /// # Errors
    ///
    /// Returns an error if metric instruments cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let meter = meter();

        let recipients = meter
            .u64_histogram("yodel.fanout.recipients")
            .with_description("Distribution of children created per fan-out")
            .build();

        let duration_seconds = meter
            .f64_histogram("yodel.fanout.duration.seconds")
            .with_description("Distribution of fan-out durations")
            .build();

        let partitions_total = meter
            .u64_counter("yodel.fanout.partitions.total")
            .with_description("Total number of partition jobs submitted")
            .build();

        let muted_total = meter
            .u64_counter("yodel.fanout.muted.total")
            .with_description("Children skipped because the recipient muted the sender")
            .build();

        Ok(Self {
            recipients,
            duration_seconds,
            partitions_total,
            muted_total,
        })
    }

    /// `kind` is `broadcast` or `group`; `lane` is where dispatch went
    pub fn record_fanout(&self, kind: &str, lane: &str, recipients: u64, duration_secs: f64) {
        let attributes = [
            KeyValue::new("kind", kind.to_string()),
            KeyValue::new("lane", lane.to_string()),
        ];
        self.recipients.record(recipients, &attributes);
        self.duration_seconds.record(duration_secs, &attributes);
    }

    pub fn record_partitions(&self, count: u64) {
        self.partitions_total.add(count, &[]);
    }

    pub fn record_muted(&self, count: u64) {
        if count > 0 {
            self.muted_total.add(count, &[]);
        }
    }
}

fn meter() -> Meter {
    opentelemetry::global::meter("yodel.fanout")
}
