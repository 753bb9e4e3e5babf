//! OpenTelemetry metrics for yodel
//!
//! Metrics are pushed over OTLP/HTTP to an OpenTelemetry Collector:
//!
//! ```text
//! yodel → OTLP/HTTP → OpenTelemetry Collector → Prometheus (scrape) → Grafana
//! ```
//!
//! Recording goes through [`metrics()`], which is `None` until
//! [`init_metrics`] has run with metrics enabled, so call sites stay no-ops
//! otherwise:
//!
//! ```rust,no_run
//! if let Some(metrics) = yodel_metrics::metrics() {
//!     metrics.delivery.record_push("sent", "apns", 1);
//! }
//! ```

mod config;
mod delivery;
mod error;
mod exporter;
mod fanout;
mod scheduler;

use once_cell::sync::OnceCell;

pub use self::{
    config::MetricsConfig, delivery::DeliveryMetrics, error::MetricsError,
    fanout::FanoutMetrics, scheduler::SchedulerMetrics,
};

static METRICS_INSTANCE: OnceCell<Metrics> = OnceCell::new();

#[derive(Debug)]
pub struct Metrics {
    pub delivery: DeliveryMetrics,
    pub fanout: FanoutMetrics,
    pub scheduler: SchedulerMetrics,
}

/// Initialise the metrics system. A no-op when disabled in `config`.
///
/// # Errors
///
/// Returns an error if the exporter cannot be built or if called more than
/// once with metrics enabled.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        tracing::info!("Metrics collection is disabled");
        return Ok(());
    }

    tracing::info!(
        endpoint = %config.endpoint,
        "Initializing OpenTelemetry metrics with OTLP exporter"
    );

    let provider = exporter::init_otlp_exporter(&config.endpoint)?;
    opentelemetry::global::set_meter_provider(provider);

    let metrics = Metrics {
        delivery: DeliveryMetrics::new()?,
        fanout: FanoutMetrics::new()?,
        scheduler: SchedulerMetrics::new()?,
    };

    METRICS_INSTANCE
        .set(metrics)
        .map_err(|_| MetricsError::AlreadyInitialized)?;

    tracing::info!("Metrics collection initialized successfully");

    Ok(())
}

/// The global metrics instance, if metrics are enabled
#[must_use]
pub fn metrics() -> Option<&'static Metrics> {
    METRICS_INSTANCE.get()
}

#[must_use]
pub fn is_enabled() -> bool {
    METRICS_INSTANCE.get().is_some()
}
