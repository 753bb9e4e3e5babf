//! Everything the controller wires together, built from its configuration.

use std::sync::Arc;

use tokio::sync::broadcast;
use yodel_common::{Signal, YoId, internal, tracing};
use yodel_delivery::{
    Dispatcher, JobQueue, Transports, YoSender,
    transport::{
        HttpPushBroker, HttpSmsProvider, HttpWebhookClient, LoggingTransport, PushBroker,
        SmsProvider, TransportsConfig, WebhookClient,
    },
};
use yodel_payload::{CopyResolver, PayloadBuilder};
use yodel_scheduler::{ScheduledYoHandler, Scheduler};
use yodel_store::{CachedYoStore, LoggingNotifier, MemoryDirectory, MemoryYoStore, PassthroughShortener};

use crate::{
    controller::Yodel,
    seed::{OutboxYo, Roster},
};

pub struct Services {
    pub store: Arc<CachedYoStore>,
    pub directory: Arc<MemoryDirectory>,
    pub roster: Roster,
    pub queue: JobQueue,
    pub dispatcher: Arc<Dispatcher>,
    pub sender: Arc<YoSender>,
    pub scheduled: Arc<ScheduledYoHandler>,
    pub scheduler: Arc<Scheduler>,
    schedule: String,
}

impl Services {
    /// Builds the in-memory store and directory, loads the seed into them and
    /// connects the pipeline to the configured transports
    pub fn wire(config: &Yodel) -> anyhow::Result<Self> {
        let store = Arc::new(CachedYoStore::new(Arc::new(MemoryYoStore::new())));
        let directory = Arc::new(MemoryDirectory::new());
        let roster = config.seed.load(&directory)?;
        let headers = Arc::new(config.seed.headers()?);

        let builder = Arc::new(PayloadBuilder::new(
            CopyResolver::new(headers, directory.clone(), &config.payload.ab_dimension),
            directory.clone(),
            Arc::new(PassthroughShortener),
            config.payload.clone(),
        ));

        let queue = JobQueue::new(config.delivery.queue.clone());
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            directory.clone(),
            builder,
            transports(&config.delivery.transports),
            queue.clone(),
            &config.delivery,
        ));

        let sender = Arc::new(YoSender::new(
            store.clone(),
            directory.clone(),
            directory.clone(),
            queue.clone(),
        ));

        let scheduled = Arc::new(ScheduledYoHandler::new(
            store.clone(),
            sender.clone(),
            Arc::new(LoggingNotifier),
            &config.scheduler,
        ));
        let scheduler =
            Arc::new(Scheduler::new(&config.scheduler).with_handler(scheduled.clone()));

        Ok(Self {
            store,
            directory,
            roster,
            queue,
            dispatcher,
            sender,
            scheduled,
            scheduler,
            schedule: config.scheduler.schedule.clone(),
        })
    }

    /// Sends `outgoing` now, or schedules it when it names a time
    pub async fn submit(&self, outgoing: &OutboxYo) -> anyhow::Result<YoId> {
        let yo = outgoing.to_yo(&self.roster, &self.schedule)?;

        if yo.scheduled_for.is_some() {
            Ok(self.scheduled.schedule(yo).await?.id)
        } else {
            Ok(self.sender.send(yo).await?)
        }
    }

    /// Runs the job queue and the scheduler until `shutdown` fires
    pub async fn serve(&self, shutdown: &broadcast::Sender<Signal>) -> anyhow::Result<()> {
        let queue = self.queue.serve(self.dispatcher.clone(), shutdown.subscribe());
        let scheduler = self.scheduler.serve(shutdown.subscribe());

        let (queue, ()) = tokio::join!(queue, scheduler);
        queue?;

        internal!("Services stopped");
        Ok(())
    }
}

/// HTTP gateways where configured, a logging stand-in everywhere else
fn transports(config: &TransportsConfig) -> Transports {
    let push: Arc<dyn PushBroker> = match &config.push {
        Some(broker) => Arc::new(HttpPushBroker::new(broker.clone())),
        None => {
            tracing::warn!("No push gateway configured, pushes will only be logged");
            Arc::new(LoggingTransport)
        }
    };

    let sms: Arc<dyn SmsProvider> = match &config.sms {
        Some(provider) => Arc::new(HttpSmsProvider::new(provider.clone())),
        None => {
            tracing::warn!("No SMS gateway configured, texts will only be logged");
            Arc::new(LoggingTransport)
        }
    };

    let webhooks: Arc<dyn WebhookClient> =
        Arc::new(HttpWebhookClient::new(config.webhook_timeout_secs));

    Transports {
        push,
        sms,
        webhooks,
    }
}
