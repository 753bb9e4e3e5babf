use std::{collections::HashSet, time::Instant};

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use yodel_common::{UserId, Yo, YoId, YoStatus, internal, tracing};
use yodel_tracing::traced;

use super::Dispatcher;
use crate::{
    error::{DeliveryError, SystemError},
    queue::{Job, Lane},
};

/// Enqueues still running when a fan-out is cut short carry on by
/// themselves, so every child inserted gets its job
struct Submissions(JoinSet<Result<(), DeliveryError>>);

impl Drop for Submissions {
    fn drop(&mut self) {
        self.0.detach_all();
    }
}

impl Dispatcher {
    /// Fans out a stored multi-recipient Yo.
    ///
    /// The parent is claimed with a compare-and-set before any child is
    /// created, so a redelivered job never creates a second set of children.
    /// A failed attempt hands the claim back so the retry can pick up where
    /// it left off.
    pub async fn fanout_yo(&self, yo_id: YoId) -> Result<u64, DeliveryError> {
        let parent = self.store.get(yo_id).await?;

        let mut claimed = None;
        for expected in [YoStatus::Pending, YoStatus::Started] {
            if self
                .store
                .compare_and_set_status(yo_id, expected, YoStatus::Sending)
                .await?
            {
                claimed = Some(expected);
                break;
            }
        }

        let Some(from) = claimed else {
            internal!(level = DEBUG, "Yo {yo_id} is {}, not fanning out again", parent.status);
            return Ok(0);
        };

        let fanned = match self.recipients_of(&parent).await {
            Ok(recipients) => self.fanout(&parent, recipients).await,
            Err(err) => Err(err),
        };

        if let Err(err) = &fanned {
            self.release_claim(yo_id, from, err).await;
        }

        fanned
    }

    async fn release_claim(&self, yo_id: YoId, from: YoStatus, err: &DeliveryError) {
        match self
            .store
            .compare_and_set_status(yo_id, YoStatus::Sending, from)
            .await
        {
            Ok(true) => {
                internal!(level = DEBUG, "Fan-out of Yo {yo_id} failed, back to {from}: {err}");
            }
            Ok(false) => {}
            Err(store_err) => {
                tracing::warn!(%yo_id, "Unable to release fan-out claim: {store_err}");
            }
        }
    }

    /// Everyone a multi-recipient Yo goes to, without the sender and without
    /// duplicates
    async fn recipients_of(&self, parent: &Yo) -> Result<Vec<UserId>, DeliveryError> {
        let sender = parent.sender()?;

        let recipients = if parent.is_broadcast {
            self.directory.followers(sender).await?
        } else if let Some(group) = parent.group {
            self.directory.group_members(group).await?
        } else {
            parent.recipients.clone()
        };

        let mut seen = HashSet::with_capacity(recipients.len());
        Ok(recipients
            .into_iter()
            .filter(|recipient| *recipient != sender && seen.insert(*recipient))
            .collect())
    }

    /// Creates one child of `parent` per recipient and submits their delivery.
    ///
    /// Children are inserted `buffer_size` at a time, already `sent` for
    /// recipients muting the sender. Broadcast children reachable by push are
    /// grouped into partitions, every other child is dispatched on its own.
    /// Recipients that already have a child from an earlier attempt are
    /// skipped. Once done the parent's counts equal the number of children.
    #[traced(instrument(level = tracing::Level::DEBUG, skip_all, fields(yo_id = %parent.id, recipients = recipients.len())), timing(precision = "ms"))]
    pub async fn fanout(&self, parent: &Yo, recipients: Vec<UserId>) -> Result<u64, DeliveryError> {
        let started = Instant::now();
        let sender = parent.sender()?;
        let now = Utc::now();

        let lane = if recipients.len() > self.fanout.custom_lane_threshold {
            Lane::Sender(sender)
        } else {
            Lane::Default
        };

        let existing = self.store.children_of(parent.id).await?;
        let resumed = existing.len() as u64;
        let covered = existing
            .iter()
            .filter_map(|child| child.recipient)
            .collect::<HashSet<_>>();
        let recipients = recipients
            .into_iter()
            .filter(|recipient| !covered.contains(recipient))
            .collect::<Vec<_>>();

        let partition_size = self.fanout.partition_size.max(1);
        let mut pool = Submissions(JoinSet::new());
        let mut partition = Vec::with_capacity(partition_size);
        let mut created = 0u64;
        let mut muted = 0u64;
        let mut partitions = 0u64;

        let creating = async {
            for batch in recipients.chunks(self.fanout.buffer_size.max(1)) {
                let mut children = Vec::with_capacity(batch.len());
                for &recipient in batch {
                    let is_muted = self.is_muted(recipient, sender, now).await;
                    children.push(parent.child_for(recipient, is_muted));
                }

                let inserted = self.store.insert_many(&children).await? as u64;
                created += inserted;

                for child in children {
                    if child.status == YoStatus::Sent {
                        muted += 1;
                        continue;
                    }

                    let Some(recipient) = child.recipient else {
                        continue;
                    };

                    let job = if parent.is_broadcast && !self.is_pseudo(recipient).await {
                        partition.push(child.id);
                        if partition.len() < partition_size {
                            continue;
                        }

                        partitions += 1;
                        Job::PushPartition {
                            parent: parent.id,
                            children: std::mem::replace(
                                &mut partition,
                                Vec::with_capacity(partition_size),
                            ),
                        }
                    } else {
                        Job::DispatchYo { yo_id: child.id }
                    };

                    self.submit(&mut pool, lane, job).await?;
                }

                self.store.increment_sent(parent.id, inserted).await?;
            }

            Ok::<_, DeliveryError>(())
        }
        .await;

        // Children already inserted still get their partition when an
        // attempt fails part way
        if !partition.is_empty() {
            partitions += 1;
            let job = Job::PushPartition {
                parent: parent.id,
                children: std::mem::take(&mut partition),
            };
            self.submit(&mut pool, lane, job).await?;
        }
        creating?;

        while let Some(submitted) = pool.0.join_next().await {
            settle(submitted)?;
        }

        let total = resumed + created;
        self.store.set_counts(parent.id, total, total).await?;
        self.store.set_status(parent.id, YoStatus::Sent).await?;

        internal!(
            level = INFO,
            "Fanned out Yo {} to {total} recipients ({resumed} from an earlier attempt, {muted} muted, {partitions} partitions) on {lane}",
            parent.id
        );

        if let Some(metrics) = yodel_metrics::metrics() {
            let kind = if parent.is_broadcast { "broadcast" } else { "group" };
            metrics.fanout.record_fanout(
                kind,
                lane.kind(),
                total,
                started.elapsed().as_secs_f64(),
            );
            metrics.fanout.record_partitions(partitions);
            metrics.fanout.record_muted(muted);
        }

        Ok(total)
    }

    /// Enqueue `job` from the submission pool, waiting for a free slot when
    /// the pool is full
    async fn submit(&self, pool: &mut Submissions, lane: Lane, job: Job) -> Result<(), DeliveryError> {
        while pool.0.len() >= self.fanout.pool_size.max(1) {
            match pool.0.join_next().await {
                Some(submitted) => settle(submitted)?,
                None => break,
            }
        }

        let queue = self.queue.clone();
        pool.0.spawn(async move { queue.enqueue(lane, job).await });

        Ok(())
    }

    async fn is_muted(&self, recipient: UserId, sender: UserId, now: DateTime<Utc>) -> bool {
        self.directory
            .contact_pair(recipient, sender)
            .await
            .ok()
            .flatten()
            .is_some_and(|pair| pair.is_muted(now))
    }

    async fn is_pseudo(&self, user: UserId) -> bool {
        self.directory
            .user(user)
            .await
            .is_ok_and(|user| user.is_pseudo)
    }
}

fn settle(
    submitted: Result<Result<(), DeliveryError>, tokio::task::JoinError>,
) -> Result<(), DeliveryError> {
    submitted.map_err(|err| SystemError::Task(err.to_string()))?
}
