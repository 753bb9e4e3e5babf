//! Channels a rendered Yo leaves the process through.
//!
//! Every transport reports one of three outcomes: success, a failure worth
//! retrying, or a rejection. Push rejections carrying one of the
//! [`REMOVE_ON_FAILURE`] codes mean the endpoint should be disabled.

mod http;
mod logging;

use async_trait::async_trait;
use thiserror::Error;
use yodel_common::{Endpoint, EndpointId};

pub use self::{
    http::{
        HttpBrokerConfig, HttpPushBroker, HttpSmsConfig, HttpSmsProvider, HttpWebhookClient,
        TransportsConfig,
    },
    logging::LoggingTransport,
};

/// Broker error codes after which an endpoint is disabled instead of retried
pub const REMOVE_ON_FAILURE: [&str; 4] = [
    "EndpointDisabled",
    "InvalidToken",
    "NotRegistered",
    "Unregistered",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("HTTP status {0}")]
    Status(u16),
}

impl TransportError {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether the target behind this error should be disabled
    pub fn disables_target(&self) -> bool {
        matches!(self, Self::Rejected { code, .. } if REMOVE_ON_FAILURE.contains(&code.as_str()))
    }

    /// Broker code, if the broker gave one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Per-endpoint result of a batch publish. Endpoints missing from the report
/// were published successfully.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub failures: Vec<(EndpointId, TransportError)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[async_trait]
pub trait PushBroker: Send + Sync {
    /// Re-enable `endpoint` at the broker. Brokers disable endpoints on
    /// their own after delivery failures, which a re-registration undoes.
    async fn enable(&self, endpoint: &Endpoint) -> Result<(), TransportError>;

    /// Publish a serialised [`PushEnvelope`](yodel_payload::PushEnvelope)
    async fn publish(&self, endpoint: &Endpoint, envelope: &str) -> Result<(), TransportError>;

    /// Publish the same envelope to many endpoints.
    ///
    /// An `Err` means nothing was published.
    async fn publish_batch(
        &self,
        endpoints: &[Endpoint],
        envelope: &str,
    ) -> Result<BatchReport, TransportError>;
}

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send(&self, phone: &str, body: &str) -> Result<(), TransportError>;
}

#[async_trait]
pub trait WebhookClient: Send + Sync {
    /// Issue a GET to `url` with `params` as the query string
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<(), TransportError>;
}
