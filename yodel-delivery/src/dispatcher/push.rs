use std::collections::{HashMap, HashSet};

use yodel_common::{CapabilityProfile, Endpoint, YoId, YoStatus, audit, tracing};
use yodel_payload::Prepared;
use yodel_tracing::traced;

use super::{Dispatcher, PushOutcome};
use crate::{
    error::{DeliveryError, SystemError},
    transport::TransportError,
};

impl Dispatcher {
    /// Force-enables `endpoint` and publishes `envelope` to it.
    ///
    /// A remove-on-failure rejection disables the endpoint and is reported
    /// as [`PushOutcome::TargetDisabled`] rather than an error, so it is
    /// neither retried nor escalated.
    #[traced(instrument(level = tracing::Level::DEBUG, skip(self, endpoint, envelope), fields(endpoint_id = %endpoint.id)), timing(precision = "ms"))]
    pub async fn push(
        &self,
        yo_id: YoId,
        endpoint: &Endpoint,
        envelope: &str,
        attempt: u32,
    ) -> Result<PushOutcome, DeliveryError> {
        if endpoint.is_disabled {
            tracing::debug!(%yo_id, endpoint = %endpoint.id, "Endpoint disabled, skipping push");
            return Ok(PushOutcome::Skipped);
        }

        let protocol = endpoint.platform.protocol();
        audit::log_push_attempt(
            &yo_id.to_string(),
            &endpoint.id.to_string(),
            protocol,
            attempt,
        );

        let broker = &self.transports.push;
        let result = match broker.enable(endpoint).await {
            Ok(()) => broker.publish(endpoint, envelope).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                record_push("sent", protocol, 1);
                Ok(PushOutcome::Sent)
            }
            Err(err) if err.disables_target() => {
                self.disable(endpoint, &err).await;
                Ok(PushOutcome::TargetDisabled)
            }
            Err(err) => {
                record_push("failed", protocol, 1);
                Err(err.into())
            }
        }
    }

    /// Publishes a broadcast to a partition of its children.
    ///
    /// Children already `sent` are skipped, so a retried partition only
    /// covers what is left. The envelope is rendered once per distinct
    /// capability profile and published as one batch per profile. Returns
    /// how many children were marked `sent`.
    #[traced(instrument(level = tracing::Level::DEBUG, skip(self, children), fields(count = children.len())), timing(precision = "ms"))]
    pub async fn push_partition(
        &self,
        parent_id: YoId,
        children: &[YoId],
        attempt: u32,
    ) -> Result<usize, DeliveryError> {
        let parent = self.store.get(parent_id).await?;

        let mut groups: HashMap<CapabilityProfile, Vec<Endpoint>> = HashMap::new();
        let mut waiting = Vec::with_capacity(children.len());

        for &child_id in children {
            let child = self.store.get(child_id).await?;
            if child.status == YoStatus::Sent {
                continue;
            }

            let Some(recipient) = child.recipient else {
                continue;
            };

            let endpoints = self
                .directory
                .endpoints_for(recipient, child.app_id.as_deref())
                .await?
                .into_iter()
                .filter(|endpoint| !endpoint.is_disabled)
                .collect::<Vec<_>>();

            if endpoints.is_empty() {
                self.mark_failed(child_id, "no enabled endpoint", attempt)
                    .await;
                continue;
            }

            let profiles = endpoints
                .iter()
                .map(Endpoint::capabilities)
                .collect::<HashSet<_>>();

            for endpoint in endpoints {
                groups
                    .entry(endpoint.capabilities())
                    .or_default()
                    .push(endpoint);
            }

            waiting.push((child_id, profiles));
        }

        if waiting.is_empty() {
            return Ok(0);
        }

        let prepared = self.prepare(&parent).await?;
        let mut failed = HashSet::new();
        let mut last_error = None;

        for (profile, endpoints) in groups {
            if let Err(err) = self
                .publish_group(&prepared, profile, &endpoints, attempt)
                .await
            {
                tracing::warn!(
                    %parent_id,
                    protocol = profile.platform.protocol(),
                    "Partition publish failed: {err}"
                );
                failed.insert(profile);
                last_error = Some(err);
            }
        }

        let mut sent = 0;
        for (child_id, profiles) in waiting {
            if profiles.is_disjoint(&failed) {
                self.store.set_status(child_id, YoStatus::Sent).await?;
                sent += 1;
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(sent),
        }
    }

    async fn publish_group(
        &self,
        prepared: &Prepared,
        profile: CapabilityProfile,
        endpoints: &[Endpoint],
        attempt: u32,
    ) -> Result<(), DeliveryError> {
        let envelope = self
            .builder
            .render(prepared, &profile)
            .await
            .push
            .to_json()
            .map_err(SystemError::from)?;

        let broker = &self.transports.push;
        let mut live = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            match broker.enable(endpoint).await {
                Ok(()) => live.push(endpoint.clone()),
                Err(err) if err.disables_target() => self.disable(endpoint, &err).await,
                Err(err) => {
                    tracing::debug!(endpoint = %endpoint.id, "Unable to enable endpoint: {err}");
                    live.push(endpoint.clone());
                }
            }
        }

        if live.is_empty() {
            return Ok(());
        }

        let protocol = profile.platform.protocol();
        audit::log_push_attempt(
            &prepared.yo.id.to_string(),
            &format!("{} endpoints", live.len()),
            protocol,
            attempt,
        );

        let report = match broker.publish_batch(&live, &envelope).await {
            Ok(report) => report,
            Err(err) => {
                record_push("failed", protocol, live.len() as u64);
                return Err(err.into());
            }
        };

        let rejected = report.failures.len();
        for (endpoint_id, err) in report.failures {
            match live.iter().find(|endpoint| endpoint.id == endpoint_id) {
                Some(endpoint) if err.disables_target() => self.disable(endpoint, &err).await,
                _ => tracing::warn!(endpoint = %endpoint_id, "Push rejected: {err}"),
            }
        }

        record_push("sent", protocol, live.len().saturating_sub(rejected) as u64);
        if rejected > 0 {
            record_push("failed", protocol, rejected as u64);
        }

        Ok(())
    }

    /// Logically disables `endpoint` after the broker rejected it
    async fn disable(&self, endpoint: &Endpoint, err: &TransportError) {
        let code = err.code().unwrap_or_default();

        if let Err(err) = self.directory.disable_endpoint(endpoint.id).await {
            tracing::error!(endpoint = %endpoint.id, "Unable to disable endpoint: {err}");
            return;
        }

        audit::log_endpoint_disabled(&endpoint.id.to_string(), &endpoint.owner.to_string(), code);

        if let Some(metrics) = yodel_metrics::metrics() {
            metrics.delivery.record_endpoint_disabled(code);
        }
    }
}

fn record_push(outcome: &str, protocol: &str, count: u64) {
    if count == 0 {
        return;
    }

    if let Some(metrics) = yodel_metrics::metrics() {
        metrics.delivery.record_push(outcome, protocol, count);
    }
}
