use async_trait::async_trait;
use yodel_common::{Endpoint, audit, outgoing};

use super::{BatchReport, PushBroker, SmsProvider, TransportError, WebhookClient};

/// Stand-in for every transport when no gateway is configured: logs what
/// would have been sent and reports success.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTransport;

#[async_trait]
impl PushBroker for LoggingTransport {
    async fn enable(&self, _endpoint: &Endpoint) -> Result<(), TransportError> {
        Ok(())
    }

    async fn publish(&self, endpoint: &Endpoint, envelope: &str) -> Result<(), TransportError> {
        outgoing!(
            level = INFO,
            "push to {} ({}): {envelope}",
            endpoint.id,
            endpoint.platform.protocol()
        );
        Ok(())
    }

    async fn publish_batch(
        &self,
        endpoints: &[Endpoint],
        envelope: &str,
    ) -> Result<BatchReport, TransportError> {
        outgoing!(level = INFO, "push to {} endpoints: {envelope}", endpoints.len());
        Ok(BatchReport::default())
    }
}

#[async_trait]
impl SmsProvider for LoggingTransport {
    async fn send(&self, phone: &str, body: &str) -> Result<(), TransportError> {
        let config = audit::config();
        outgoing!(
            level = INFO,
            "sms to {}: {}",
            audit::redact_phone(phone, config.redact_phone_numbers),
            audit::redact_text(body, config.redact_text)
        );
        Ok(())
    }
}

#[async_trait]
impl WebhookClient for LoggingTransport {
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<(), TransportError> {
        outgoing!(level = INFO, "GET {url} with {} params", params.len());
        Ok(())
    }
}
