use std::{path::Path, sync::LazyLock};

use serde::Deserialize;
use tokio::sync::broadcast;
use yodel_common::{Signal, audit, internal, logging, tracing};
use yodel_delivery::DeliveryConfig;
use yodel_metrics::MetricsConfig;
use yodel_payload::PayloadConfig;
use yodel_scheduler::SchedulerConfig;
use yodel_tracing::traced;

use crate::{
    seed::{OutboxYo, Seed},
    services::Services,
};

#[derive(Default, Deserialize)]
pub struct Yodel {
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub audit: audit::AuditConfig,
    #[serde(default)]
    pub seed: Seed,
    /// Submitted once everything is running
    #[serde(default)]
    pub outbox: Vec<OutboxYo>,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

#[traced(instrument(level = tracing::Level::TRACE))]
async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!("Terminate Signal received, shutting down");
        }
    };

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    Ok(())
}

impl Yodel {
    /// Reads a controller from the RON file at `path`
    ///
    /// # Errors
    ///
    /// If the file can't be read or isn't a valid configuration.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
        })?;

        Ok(ron::from_str(&content)?)
    }

    /// Run this controller, and everything it controls
    ///
    /// # Errors
    ///
    /// This function will return an error if the seed data is invalid, metrics
    /// fail to initialise, or the job queue stops unexpectedly.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all, err), timing(precision = "s"))]
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();
        audit::init(self.audit.clone());
        yodel_metrics::init_metrics(&self.metrics)?;

        let services = Services::wire(&self)?;

        internal!("Controller running");

        let submit = async {
            for outgoing in &self.outbox {
                match services.submit(outgoing).await {
                    Ok(id) => internal!(level = INFO, "Submitted Yo {id} from {}", outgoing.from),
                    Err(err) => {
                        tracing::error!(from = %outgoing.from, "Unable to submit Yo: {err}");
                    }
                }
            }

            shutdown().await
        };

        let ret = tokio::try_join!(services.serve(&SHUTDOWN_BROADCAST), submit).map(|_| ());

        internal!("Shutting down...");

        ret
    }
}
