use std::collections::HashMap;

use yodel_common::{
    ApiError, CapabilityProfile, Endpoint, User, Yo, YoId, YoStatus, internal, tracing,
};
use yodel_payload::Prepared;
use yodel_tracing::traced;

use super::{DispatchOutcome, Dispatcher};
use crate::{
    error::{DeliveryError, SystemError},
    queue::{Job, Lane},
};

impl Dispatcher {
    /// Delivers a single-recipient Yo.
    ///
    /// A Yo already `sent` is left alone. Otherwise the recipient's enabled
    /// endpoints each get a push job, or the recipient is texted when they
    /// only have a phone number.
    ///
    /// # Errors
    ///
    /// A missing Yo is a [`SystemError::YoNotFound`] and isn't retried.
    #[traced(instrument(level = tracing::Level::DEBUG, skip(self)), timing(precision = "ms"))]
    pub async fn dispatch_yo(&self, yo_id: YoId) -> Result<DispatchOutcome, DeliveryError> {
        let yo = self.store.get(yo_id).await?;

        if yo.status == YoStatus::Sent {
            internal!(level = DEBUG, "Yo {yo_id} was already sent, skipping");
            return Ok(DispatchOutcome::AlreadySent);
        }

        let recipient_id = yo.single_recipient().ok_or(ApiError::MissingRecipient)?;

        self.store.set_status(yo_id, YoStatus::Sending).await?;

        let recipient = self.directory.user(recipient_id).await?;
        let prepared = self.prepare(&yo).await?;

        let endpoints = if recipient.is_pseudo {
            Vec::new()
        } else {
            self.reachable_endpoints(&yo, &recipient).await?
        };

        let outcome = if !endpoints.is_empty() {
            DispatchOutcome::Queued {
                pushes: self.queue_pushes(&prepared, endpoints).await?,
                sms: false,
            }
        } else if let Some(phone) = recipient.phone.as_deref().filter(|_| !yo.is_push_only) {
            DispatchOutcome::Queued {
                pushes: 0,
                sms: self.queue_sms(&prepared, &recipient, phone).await?,
            }
        } else {
            self.mark_failed(yo_id, "no reachable endpoint or phone number", 1)
                .await;
            return Ok(DispatchOutcome::Unreachable);
        };

        self.trigger_callbacks(&yo, &prepared.sender, &recipient);
        self.touch_contact(recipient_id, prepared.sender.id).await;

        self.store.set_status(yo_id, YoStatus::Sent).await?;

        Ok(outcome)
    }

    async fn reachable_endpoints(
        &self,
        yo: &Yo,
        recipient: &User,
    ) -> Result<Vec<Endpoint>, DeliveryError> {
        Ok(self
            .directory
            .endpoints_for(recipient.id, yo.app_id.as_deref())
            .await?
            .into_iter()
            .filter(|endpoint| !endpoint.is_disabled)
            .collect())
    }

    /// One push job per endpoint, rendering once per distinct profile
    async fn queue_pushes(
        &self,
        prepared: &Prepared,
        endpoints: Vec<Endpoint>,
    ) -> Result<usize, DeliveryError> {
        let mut rendered: HashMap<CapabilityProfile, String> = HashMap::new();
        let count = endpoints.len();

        for endpoint in endpoints {
            let profile = endpoint.capabilities();

            let envelope = if let Some(envelope) = rendered.get(&profile) {
                envelope.clone()
            } else {
                let envelope = self
                    .builder
                    .render(prepared, &profile)
                    .await
                    .push
                    .to_json()
                    .map_err(SystemError::from)?;
                rendered.insert(profile, envelope.clone());
                envelope
            };

            self.queue.enqueue_follow_up(
                Lane::Default,
                Job::Push {
                    yo_id: prepared.yo.id,
                    endpoint: endpoint.id,
                    envelope,
                },
            )?;
        }

        Ok(count)
    }
}
