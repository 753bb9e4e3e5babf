//! Delivery metrics
//!
//! Tracks per-channel sends, endpoints disabled by the broker, and job queue
//! activity per lane.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

use crate::MetricsError;

#[derive(Debug)]
pub struct DeliveryMetrics {
    /// Broker publishes by outcome and protocol
    pushes_total: Counter<u64>,

    /// SMS sends by outcome, split into welcome and regular messages
    sms_total: Counter<u64>,

    /// Webhook callbacks by outcome
    callbacks_total: Counter<u64>,

    /// Endpoints disabled on a remove-on-failure broker code
    endpoints_disabled: Counter<u64>,

    /// Job attempts by lane and outcome
    job_attempts: Counter<u64>,

    /// Time spent on a single job attempt, by lane
    job_duration_seconds: Histogram<f64>,

    /// Jobs that ran out of attempts or failed permanently, by lane
    jobs_failed: Counter<u64>,

    /// Jobs enqueued but not yet finished, shared with the gauge callback
    jobs_in_flight: Arc<AtomicU64>,
}

impl DeliveryMetrics {
    /// # Errors
    ///
    /// Returns an error if metric instruments cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let meter = meter();

        let pushes_total = meter
            .u64_counter("yodel.delivery.pushes.total")
            .with_description("Broker publishes by outcome and protocol")
            .build();

        let sms_total = meter
            .u64_counter("yodel.delivery.sms.total")
            .with_description("SMS sends by outcome")
            .build();

        let callbacks_total = meter
            .u64_counter("yodel.delivery.callbacks.total")
            .with_description("Webhook callbacks by outcome")
            .build();

        let endpoints_disabled = meter
            .u64_counter("yodel.delivery.endpoints.disabled.total")
            .with_description("Endpoints disabled after a broker rejection")
            .build();

        let job_attempts = meter
            .u64_counter("yodel.delivery.jobs.attempts.total")
            .with_description("Job attempts by lane and outcome")
            .build();

        let job_duration_seconds = meter
            .f64_histogram("yodel.delivery.jobs.duration.seconds")
            .with_description("Distribution of job attempt durations by lane")
            .build();

        let jobs_failed = meter
            .u64_counter("yodel.delivery.jobs.failed.total")
            .with_description("Jobs handed to the failure hook by lane")
            .build();

        let jobs_in_flight = Arc::new(AtomicU64::new(0));
        let in_flight = Arc::clone(&jobs_in_flight);

        meter
            .u64_observable_gauge("yodel.delivery.jobs.in_flight")
            .with_description("Jobs enqueued and not yet finished")
            .with_callback(move |observer| {
                observer.observe(in_flight.load(Ordering::Relaxed), &[]);
            })
            .build();

        Ok(Self {
            pushes_total,
            sms_total,
            callbacks_total,
            endpoints_disabled,
            job_attempts,
            job_duration_seconds,
            jobs_failed,
            jobs_in_flight,
        })
    }

    /// `count` is the number of addresses covered by one publish
    pub fn record_push(&self, outcome: &str, protocol: &str, count: u64) {
        let attributes = [
            KeyValue::new("outcome", outcome.to_string()),
            KeyValue::new("protocol", protocol.to_string()),
        ];
        self.pushes_total.add(count, &attributes);
    }

    pub fn record_sms(&self, outcome: &str, welcome: bool) {
        let attributes = [
            KeyValue::new("outcome", outcome.to_string()),
            KeyValue::new("welcome", welcome),
        ];
        self.sms_total.add(1, &attributes);
    }

    pub fn record_callback(&self, outcome: &str) {
        self.callbacks_total
            .add(1, &[KeyValue::new("outcome", outcome.to_string())]);
    }

    pub fn record_endpoint_disabled(&self, code: &str) {
        self.endpoints_disabled
            .add(1, &[KeyValue::new("code", code.to_string())]);
    }

    pub fn record_job_attempt(&self, lane: &str, outcome: &str, duration_secs: f64) {
        let lane = KeyValue::new("lane", lane.to_string());
        self.job_duration_seconds
            .record(duration_secs, std::slice::from_ref(&lane));
        self.job_attempts
            .add(1, &[lane, KeyValue::new("outcome", outcome.to_string())]);
    }

    pub fn record_job_failed(&self, lane: &str, reason: &str) {
        let attributes = [
            KeyValue::new("lane", lane.to_string()),
            KeyValue::new("reason", reason.to_string()),
        ];
        self.jobs_failed.add(1, &attributes);
    }

    pub fn job_enqueued(&self) {
        self.jobs_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_finished(&self) {
        let _ = self
            .jobs_in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(1)
            });
    }

    #[must_use]
    pub fn jobs_in_flight(&self) -> u64 {
        self.jobs_in_flight.load(Ordering::Relaxed)
    }
}

fn meter() -> Meter {
    opentelemetry::global::meter("yodel.delivery")
}
