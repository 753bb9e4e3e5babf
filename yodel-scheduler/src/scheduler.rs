use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use yodel_common::{Signal, internal, tracing};
use yodel_tracing::traced;

use crate::{
    config::SchedulerConfig,
    error::SchedulerError,
    handler::{Execution, ScheduleHandler, ScheduledItem},
};

/// Polls its handlers for due work and executes it.
///
/// Handlers are injected per job type; the scheduler itself holds no state
/// beyond them, so discovery always reflects the store.
pub struct Scheduler {
    handlers: HashMap<&'static str, Arc<dyn ScheduleHandler>>,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            handlers: HashMap::new(),
            poll_interval: config.poll_interval(),
        }
    }

    /// Adds `handler`, replacing any handler for the same job type
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn ScheduleHandler>) -> Self {
        self.handlers.insert(handler.job_type(), handler);
        self
    }

    /// The handler for `job_type`
    ///
    /// # Errors
    ///
    /// [`SchedulerError::UnknownJobType`] when nothing handles it.
    pub fn handler(&self, job_type: &str) -> Result<&Arc<dyn ScheduleHandler>, SchedulerError> {
        self.handlers
            .get(job_type)
            .ok_or_else(|| SchedulerError::UnknownJobType(job_type.to_string()))
    }

    /// Announces a freshly scheduled item through its handler
    ///
    /// # Errors
    ///
    /// [`SchedulerError::UnknownJobType`] when nothing handles the item.
    pub async fn announce(&self, item: &ScheduledItem) -> Result<(), SchedulerError> {
        self.handler(item.job_type)?.on_new(item).await;
        Ok(())
    }

    /// Discovers and executes everything due at `now`, returning how many
    /// items were started. A failing item is handed to its handler's
    /// `on_failure` and doesn't stop the rest.
    #[traced(instrument(level = tracing::Level::DEBUG, skip(self)), timing(precision = "ms"))]
    pub async fn poll_once(&self, now: DateTime<Utc>) -> usize {
        let mut started = 0;

        for (job_type, handler) in &self.handlers {
            let items = match handler.discover(now).await {
                Ok(items) => items,
                Err(err) => {
                    tracing::error!(job_type, "Discovery failed: {err}");
                    continue;
                }
            };

            if items.is_empty() {
                continue;
            }

            internal!(level = DEBUG, "Discovered {} due {job_type} items", items.len());
            if let Some(metrics) = yodel_metrics::metrics() {
                metrics
                    .scheduler
                    .record_discovered(job_type, items.len() as u64);
            }

            for item in items {
                let lag = item.lag(now).as_secs_f64();

                let outcome = match handler.execute(&item).await {
                    Ok(Execution::Started) => {
                        started += 1;
                        "started"
                    }
                    Ok(Execution::ClaimedElsewhere) => {
                        if let Some(metrics) = yodel_metrics::metrics() {
                            metrics.scheduler.record_claimed_elsewhere(job_type);
                        }
                        continue;
                    }
                    Err(err) => {
                        tracing::warn!(job_type, id = %item.id, "Scheduled item failed: {err}");
                        handler.on_failure(&item, &err).await;
                        "failed"
                    }
                };

                if let Some(metrics) = yodel_metrics::metrics() {
                    metrics.scheduler.record_executed(job_type, outcome, lag);
                }
            }
        }

        started
    }

    /// How long to sleep after a poll at `now`: until the next due item,
    /// but never longer than the poll interval
    pub async fn next_sleep(&self, now: DateTime<Utc>) -> Duration {
        let mut sleep = self.poll_interval;

        for (job_type, handler) in &self.handlers {
            match handler.next_delay(now).await {
                Ok(Some(delay)) => sleep = sleep.min(delay),
                Ok(None) => {}
                Err(err) => tracing::warn!(job_type, "Unable to work out next due time: {err}"),
            }
        }

        sleep
    }

    /// Polls until a shutdown signal arrives
    #[traced(instrument(level = tracing::Level::TRACE, skip_all))]
    pub async fn serve(&self, mut shutdown: broadcast::Receiver<Signal>) {
        internal!(
            "Scheduler starting with {} handlers, polling at least every {}s",
            self.handlers.len(),
            self.poll_interval.as_secs()
        );

        loop {
            let started = self.poll_once(Utc::now()).await;
            if started > 0 {
                internal!(level = INFO, "Started {started} scheduled items");
            }

            let sleep = self.next_sleep(Utc::now()).await;

            tokio::select! {
                () = tokio::time::sleep(sleep) => {}
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!(level = INFO, "Scheduler received shutdown signal");
                        }
                        Err(e) => {
                            tracing::error!("Scheduler shutdown channel error: {e}");
                        }
                    }
                    break;
                }
            }
        }

        internal!("Scheduler shutdown complete");
    }
}
