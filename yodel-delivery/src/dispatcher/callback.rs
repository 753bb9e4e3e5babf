use yodel_common::{User, Yo, YoId, tracing};
use yodel_payload::WebhookParams;

use super::Dispatcher;
use crate::queue::{Job, Lane};

impl Dispatcher {
    /// Queues a callback for the recipient's webhook, and for the sender's
    /// when the sender is a service account. Never fails the dispatch.
    pub(super) fn trigger_callbacks(&self, yo: &Yo, sender: &User, recipient: &User) {
        let mut urls = Vec::with_capacity(2);

        if let Some(url) = &recipient.callback_url {
            urls.push(url.clone());
        }

        if sender.is_service
            && let Some(url) = &sender.callback_url
        {
            urls.push(url.clone());
        }

        if urls.is_empty() {
            return;
        }

        let params = WebhookParams::build(yo, sender);

        for url in urls {
            let job = Job::Callback {
                yo_id: yo.id,
                url,
                params: params.pairs().to_vec(),
            };

            if let Err(err) = self.queue.enqueue_follow_up(Lane::Callbacks, job) {
                tracing::warn!(yo_id = %yo.id, "Unable to queue callback: {err}");
            }
        }
    }

    /// Performs the callback GET. Failures are logged and swallowed.
    pub async fn callback(&self, yo_id: YoId, url: &str, params: &[(String, String)]) {
        let result = self.transports.webhooks.get(url, params).await;

        if let Some(metrics) = yodel_metrics::metrics() {
            metrics
                .delivery
                .record_callback(if result.is_ok() { "sent" } else { "failed" });
        }

        if let Err(err) = result {
            tracing::warn!(%yo_id, %url, "Callback failed: {err}");
        }
    }
}
