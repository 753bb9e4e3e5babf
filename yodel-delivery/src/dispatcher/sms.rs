use yodel_common::{CapabilityProfile, User, YoId, audit, internal, tracing};
use yodel_payload::Prepared;

use super::Dispatcher;
use crate::{
    error::DeliveryError,
    queue::{Job, Lane},
};

impl Dispatcher {
    /// Queues the SMS for `prepared`, preceded by the welcome text when the
    /// recipient has never had one.
    ///
    /// Returns `false` when an SMS to `phone` is already queued or in flight.
    pub(super) async fn queue_sms(
        &self,
        prepared: &Prepared,
        recipient: &User,
        phone: &str,
    ) -> Result<bool, DeliveryError> {
        if !self.guard.try_acquire(phone) {
            let config = audit::config();
            internal!(
                level = DEBUG,
                "An SMS to {} is already on its way, not sending another",
                audit::redact_phone(phone, config.redact_phone_numbers)
            );
            return Ok(false);
        }

        let queued = self.enqueue_sms(prepared, recipient, phone).await;
        if queued.is_err() {
            self.guard.release(phone);
        }

        queued.map(|()| true)
    }

    async fn enqueue_sms(
        &self,
        prepared: &Prepared,
        recipient: &User,
        phone: &str,
    ) -> Result<(), DeliveryError> {
        let yo_id = prepared.yo.id;
        let body = self
            .builder
            .render(prepared, &CapabilityProfile::sms())
            .await
            .sms;

        let welcome =
            !recipient.sms_welcomed && self.directory.mark_sms_welcomed(recipient.id).await?;

        let job = if welcome {
            Job::Sms {
                yo_id,
                phone: phone.to_string(),
                body: self.builder.welcome_sms(prepared),
                welcome: true,
                then: Some(body),
            }
        } else {
            Job::Sms {
                yo_id,
                phone: phone.to_string(),
                body,
                welcome: false,
                then: None,
            }
        };

        self.queue.enqueue_follow_up(Lane::Sms, job)
    }

    /// Queues the Yo's own text once the welcome ahead of it is done with
    pub(super) fn queue_sms_after_welcome(
        &self,
        yo_id: YoId,
        phone: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        let queued = self.queue.enqueue_follow_up(
            Lane::Sms,
            Job::Sms {
                yo_id,
                phone: phone.to_string(),
                body: body.to_string(),
                welcome: false,
                then: None,
            },
        );
        if queued.is_err() {
            self.guard.release(phone);
        }

        queued
    }

    /// Sends one text. The guard on `phone` is released once the Yo itself
    /// (not the welcome) has gone out, and a welcome queues `then` behind it.
    pub async fn sms(
        &self,
        yo_id: YoId,
        phone: &str,
        body: &str,
        welcome: bool,
        then: Option<&str>,
    ) -> Result<(), DeliveryError> {
        let result = self.transports.sms.send(phone, body).await;

        if let Some(metrics) = yodel_metrics::metrics() {
            metrics
                .delivery
                .record_sms(if result.is_ok() { "sent" } else { "failed" }, welcome);
        }

        match result {
            Ok(()) => {
                audit::log_sms_sent(&yo_id.to_string(), phone, welcome);
                match then {
                    Some(next) => self.queue_sms_after_welcome(yo_id, phone, next),
                    None => {
                        if !welcome {
                            self.guard.release(phone);
                        }
                        Ok(())
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%yo_id, welcome, "SMS failed: {err}");
                Err(err.into())
            }
        }
    }
}
