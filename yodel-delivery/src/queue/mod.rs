//! Bounded job queue with named lanes.
//!
//! `enqueue` waits while the shared channel is full, and the server stops
//! draining that channel while `max_in_flight` jobs are taken and unfinished,
//! so a burst of submissions is held back at the caller. Each job runs on its
//! own task, gated by its lane's semaphore, with a per-attempt timeout and the
//! lane's retry policy. A job that fails permanently or runs out of attempts
//! is handed to [`JobHandler::on_failure`].
//!
//! Jobs queue their own follow-up work with [`JobQueue::enqueue_follow_up`],
//! which never waits: a running job blocked on the channel it is holding up
//! would never finish. Fan-outs run on [`Lane::Fanout`] and sit outside the
//! in-flight ceiling, since they wait on the bounded channel for their
//! children and are already capped by their lane.

mod config;
mod job;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::{
    sync::{Notify, Semaphore, broadcast, mpsc},
    task::JoinSet,
};
use yodel_common::{Signal, internal, tracing};
use yodel_tracing::traced;

pub use self::{
    config::{LaneConfig, QueueConfig},
    job::{Job, Lane},
};
use crate::error::{DeliveryError, SystemError, TemporaryError};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait JobHandler: Send + Sync {
    /// `attempt` is 1-based
    async fn run(&self, job: &Job, attempt: u32) -> Result<(), DeliveryError>;

    /// Called once for a job that won't be attempted again
    async fn on_failure(&self, job: &Job, error: &DeliveryError, attempts: u32);
}

#[derive(Debug)]
struct Queued {
    lane: Lane,
    job: Job,
}

#[derive(Debug)]
struct Inner {
    config: QueueConfig,
    tx: mpsc::Sender<Queued>,
    rx: Mutex<Option<mpsc::Receiver<Queued>>>,
    follow_tx: mpsc::UnboundedSender<Queued>,
    follow_rx: Mutex<Option<mpsc::UnboundedReceiver<Queued>>>,
    lanes: DashMap<Lane, Arc<Semaphore>>,
    /// Enqueued and not yet finished, retries included
    pending: AtomicUsize,
    idle: Notify,
}

/// Cheap to clone handle onto the shared queue
#[derive(Debug, Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let (follow_tx, follow_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(Inner {
                config,
                tx,
                rx: Mutex::new(Some(rx)),
                follow_tx,
                follow_rx: Mutex::new(Some(follow_rx)),
                lanes: DashMap::new(),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Jobs enqueued and not yet finished
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Queue `job` on `lane`, waiting only while the queue is full
    ///
    /// # Errors
    ///
    /// Fails if the queue has shut down.
    pub async fn enqueue(&self, lane: Lane, job: Job) -> Result<(), DeliveryError> {
        self.enqueued(lane, &job);

        if self.inner.tx.send(Queued { lane, job }).await.is_err() {
            self.finished();
            return Err(SystemError::QueueClosed.into());
        }

        Ok(())
    }

    /// Queue work a running job produced. Never waits, and doesn't count
    /// against the channel's capacity.
    ///
    /// # Errors
    ///
    /// Fails if the queue has shut down.
    pub fn enqueue_follow_up(&self, lane: Lane, job: Job) -> Result<(), DeliveryError> {
        self.enqueued(lane, &job);

        if self.inner.follow_tx.send(Queued { lane, job }).is_err() {
            self.finished();
            return Err(SystemError::QueueClosed.into());
        }

        Ok(())
    }

    fn enqueued(&self, lane: Lane, job: &Job) {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        if let Some(metrics) = yodel_metrics::metrics() {
            metrics.delivery.job_enqueued();
        }

        tracing::trace!(%lane, kind = job.kind(), yo_id = %job.yo_id(), "Enqueueing job");
    }

    /// Resolves once every enqueued job, including anything those jobs
    /// enqueued in turn, has finished
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }

            notified.await;
        }
    }

    fn finished(&self) {
        if self.inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }

        if let Some(metrics) = yodel_metrics::metrics() {
            metrics.delivery.job_finished();
        }
    }

    fn semaphore(&self, lane: Lane) -> Arc<Semaphore> {
        self.inner
            .lanes
            .entry(lane)
            .or_insert_with(|| {
                Arc::new(Semaphore::new(
                    self.inner.config.lane(&lane).concurrency.max(1),
                ))
            })
            .clone()
    }

    /// Run jobs with `handler` until a shutdown signal arrives.
    ///
    /// In-flight jobs get a grace period to finish once shutdown starts.
    ///
    /// # Errors
    ///
    /// Fails if the queue is already being served.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all))]
    pub async fn serve(
        &self,
        handler: Arc<dyn JobHandler>,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), DeliveryError> {
        let (mut rx, mut follow_rx) = {
            let mut rx = self.inner.rx.lock();
            let mut follow_rx = self.inner.follow_rx.lock();
            match (rx.take(), follow_rx.take()) {
                (Some(rx), Some(follow_rx)) => (rx, follow_rx),
                _ => return Err(SystemError::AlreadyServing.into()),
            }
        };

        internal!("Job queue starting");

        let max_in_flight = self.inner.config.max_in_flight.max(1);
        let mut tasks = JoinSet::new();
        let mut fanouts = JoinSet::new();

        loop {
            let open = tasks.len() < max_in_flight;

            tokio::select! {
                biased;

                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!(level = INFO, "Job queue received shutdown signal");
                        }
                        Err(e) => {
                            tracing::error!("Job queue shutdown channel error: {e}");
                        }
                    }
                    break;
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                Some(_) = fanouts.join_next(), if !fanouts.is_empty() => {}
                Some(queued) = follow_rx.recv(), if open => {
                    self.spawn(queued, &handler, &mut tasks, &mut fanouts);
                }
                queued = rx.recv(), if open => {
                    let Some(queued) = queued else { break };
                    self.spawn(queued, &handler, &mut tasks, &mut fanouts);
                }
            }
        }

        let remaining = tasks.len() + fanouts.len();
        if remaining > 0 {
            internal!(level = INFO, "Waiting for {remaining} in-flight jobs");

            let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
                while tasks.join_next().await.is_some() {}
                while fanouts.join_next().await.is_some() {}
            })
            .await;

            if drained.is_err() {
                tracing::warn!(
                    "Shutdown timeout exceeded, {} jobs abandoned",
                    tasks.len() + fanouts.len()
                );
                tasks.abort_all();
                fanouts.abort_all();
            }
        }

        internal!("Job queue shutdown complete");
        Ok(())
    }

    fn spawn(
        &self,
        queued: Queued,
        handler: &Arc<dyn JobHandler>,
        tasks: &mut JoinSet<()>,
        fanouts: &mut JoinSet<()>,
    ) {
        let set = if queued.lane == Lane::Fanout { fanouts } else { tasks };
        let queue = self.clone();
        let handler = Arc::clone(handler);
        set.spawn(async move { queue.execute(queued, handler.as_ref()).await });
    }

    async fn execute(&self, queued: Queued, handler: &dyn JobHandler) {
        let Queued { lane, job } = queued;
        let lane_config = self.inner.config.lane(&lane).clone();
        let semaphore = self.semaphore(lane);
        let mut attempts = 0;

        loop {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };

            attempts += 1;
            let started = Instant::now();

            let result = tokio::time::timeout(lane_config.timeout(), handler.run(&job, attempts))
                .await
                .unwrap_or_else(|_| {
                    Err(TemporaryError::Timeout(format!(
                        "{} after {}s",
                        job.kind(),
                        lane_config.timeout_secs
                    ))
                    .into())
                });

            drop(permit);

            if let Some(metrics) = yodel_metrics::metrics() {
                let outcome = match &result {
                    Ok(()) => "success",
                    Err(err) => err.reason(),
                };
                metrics.delivery.record_job_attempt(
                    lane.kind(),
                    outcome,
                    started.elapsed().as_secs_f64(),
                );
            }

            match result {
                Ok(()) => break,
                Err(err) if err.is_temporary() && lane_config.retry.should_retry(attempts) => {
                    let delay = lane_config.retry.delay_for(attempts);
                    tracing::warn!(
                        %lane,
                        kind = job.kind(),
                        yo_id = %job.yo_id(),
                        attempts,
                        "Job failed, retrying in {}ms: {err}",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::error!(
                        %lane,
                        kind = job.kind(),
                        yo_id = %job.yo_id(),
                        attempts,
                        "Job failed: {err}"
                    );

                    if let Some(metrics) = yodel_metrics::metrics() {
                        metrics.delivery.record_job_failed(lane.kind(), err.reason());
                    }

                    handler.on_failure(&job, &err, attempts).await;
                    break;
                }
            }
        }

        self.finished();
    }
}
