//! HTTP implementations of the transports.
//!
//! The push broker is spoken to through a small JSON gateway:
//!
//! - `POST {url}/endpoints/enable` with `{ token, protocol }`
//! - `POST {url}/publish` with `{ token, protocol, message }`
//! - `POST {url}/publish/batch` with `{ targets, message }`, answering
//!   `{ failures: [{ id, code, message }] }`
//!
//! Rejections come back as a 4xx with a `{ code, message }` body.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use yodel_common::{Endpoint, EndpointId, outgoing};

use super::{BatchReport, PushBroker, SmsProvider, TransportError, WebhookClient};

#[derive(Debug, Clone, Deserialize)]
pub struct TransportsConfig {
    /// Push gateway. Pushes are only logged when absent.
    #[serde(default)]
    pub push: Option<HttpBrokerConfig>,

    /// SMS gateway. Texts are only logged when absent.
    #[serde(default)]
    pub sms: Option<HttpSmsConfig>,

    #[serde(default = "defaults::timeout_secs")]
    pub webhook_timeout_secs: u64,
}

impl Default for TransportsConfig {
    fn default() -> Self {
        Self {
            push: None,
            sms: None,
            webhook_timeout_secs: defaults::timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpBrokerConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSmsConfig {
    pub url: String,
    /// Number texts are sent from
    pub from: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
}

mod defaults {
    pub const fn timeout_secs() -> u64 {
        10
    }
}

#[derive(Debug, Deserialize)]
struct Rejection {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct Target<'a> {
    id: EndpointId,
    token: &'a str,
    protocol: &'static str,
}

#[derive(Debug, Deserialize)]
struct BatchFailure {
    id: EndpointId,
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    failures: Vec<BatchFailure>,
}

fn transport_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Unavailable(err.to_string())
    }
}

/// Turns a non-success response into the matching [`TransportError`]
async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.is_client_error()
        && let Ok(rejection) = response.json::<Rejection>().await
    {
        return Err(TransportError::Rejected {
            code: rejection.code,
            message: rejection.message,
        });
    }

    Err(TransportError::Status(status.as_u16()))
}

fn authorised(request: reqwest::RequestBuilder, api_key: Option<&str>) -> reqwest::RequestBuilder {
    match api_key {
        Some(key) => request.bearer_auth(key),
        None => request,
    }
}

pub struct HttpPushBroker {
    client: reqwest::Client,
    config: HttpBrokerConfig,
}

impl HttpPushBroker {
    pub fn new(config: HttpBrokerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{path}", self.config.url.trim_end_matches('/'));
        authorised(
            self.client
                .post(url)
                .timeout(Duration::from_secs(self.config.timeout_secs)),
            self.config.api_key.as_deref(),
        )
    }
}

#[async_trait]
impl PushBroker for HttpPushBroker {
    async fn enable(&self, endpoint: &Endpoint) -> Result<(), TransportError> {
        let response = self
            .post("endpoints/enable")
            .json(&serde_json::json!({
                "token": endpoint.token,
                "protocol": endpoint.platform.protocol(),
            }))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        check(response).await.map(|_| ())
    }

    async fn publish(&self, endpoint: &Endpoint, envelope: &str) -> Result<(), TransportError> {
        outgoing!(level = DEBUG, "Publishing to endpoint {}", endpoint.id);

        let response = self
            .post("publish")
            .json(&serde_json::json!({
                "token": endpoint.token,
                "protocol": endpoint.platform.protocol(),
                "message": envelope,
            }))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        check(response).await.map(|_| ())
    }

    async fn publish_batch(
        &self,
        endpoints: &[Endpoint],
        envelope: &str,
    ) -> Result<BatchReport, TransportError> {
        outgoing!(level = DEBUG, "Publishing batch to {} endpoints", endpoints.len());

        let targets = endpoints
            .iter()
            .map(|endpoint| Target {
                id: endpoint.id,
                token: &endpoint.token,
                protocol: endpoint.platform.protocol(),
            })
            .collect::<Vec<_>>();

        let response = self
            .post("publish/batch")
            .json(&serde_json::json!({ "targets": targets, "message": envelope }))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let body = check(response)
            .await?
            .json::<BatchResponse>()
            .await
            .unwrap_or_default();

        Ok(BatchReport {
            failures: body
                .failures
                .into_iter()
                .map(|failure| {
                    (
                        failure.id,
                        TransportError::Rejected {
                            code: failure.code,
                            message: failure.message,
                        },
                    )
                })
                .collect(),
        })
    }
}

pub struct HttpSmsProvider {
    client: reqwest::Client,
    config: HttpSmsConfig,
}

impl HttpSmsProvider {
    pub fn new(config: HttpSmsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl SmsProvider for HttpSmsProvider {
    async fn send(&self, phone: &str, body: &str) -> Result<(), TransportError> {
        let request = self
            .client
            .post(&self.config.url)
            .json(&serde_json::json!({
                "from": self.config.from,
                "to": phone,
                "body": body,
            }))
            .timeout(Duration::from_secs(self.config.timeout_secs));

        let response = authorised(request, self.config.api_key.as_deref())
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        check(response).await.map(|_| ())
    }
}

pub struct HttpWebhookClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpWebhookClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl WebhookClient for HttpWebhookClient {
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<(), TransportError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }
}
