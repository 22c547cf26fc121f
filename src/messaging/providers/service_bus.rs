//! # Azure Service Bus Provider
//!
//! Queue sessions over the Service Bus HTTPS REST surface.
//!
//! - **Receive**: peek-lock (`POST {queue}/messages/head?timeout=N`), one
//!   message per request until the batch is full or the deadline passes
//! - **Acknowledge**: complete (`DELETE {queue}/messages/{id}/{lockToken}`)
//! - **Peek**: the REST surface has no browse operation, so a peek reads the
//!   queue entity (`GET {queue}`) to prove reachability and authorization and
//!   returns no messages. A 200 carrying an empty Atom feed means the queue
//!   does not exist
//!
//! Connection strings are signed into shared access signatures per request;
//! bearer tokens are sent as-is until they expire.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{self, HeaderMap};
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::constants::service_bus;
use crate::messaging::credential::{Authorizer, Credential};
use crate::messaging::errors::{QueueError, QueueResult};
use crate::messaging::message::{MessageBody, QueueMessage};
use crate::messaging::session::{QueueReceiver, QueueTarget};

/// Extra time allowed on top of the server-side receive timeout
const REQUEST_GRACE: Duration = Duration::from_secs(10);

/// Timeout for requests that do not long-poll
const SHORT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Service Bus queue provider using the REST API
#[derive(Debug, Clone)]
pub struct ServiceBusProvider {
    http_client: HttpClient,
}

impl ServiceBusProvider {
    pub fn new() -> QueueResult<Self> {
        let http_client = HttpClient::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| QueueError::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http_client })
    }

    /// Use a caller-supplied HTTP client (proxies, custom TLS roots)
    pub fn with_client(http_client: HttpClient) -> Self {
        Self { http_client }
    }

    pub(crate) async fn open_session(
        &self,
        credential: &Credential,
        target: &QueueTarget,
    ) -> QueueResult<ServiceBusSession> {
        let authorizer = Authorizer::from_credential(credential)?;
        let namespace_url = resolve_namespace_url(target, &authorizer)?;

        Ok(ServiceBusSession {
            http_client: self.http_client.clone(),
            queue_url: format!("{}/{}", namespace_url, target.queue_name),
            queue_name: target.queue_name.clone(),
            authorizer,
        })
    }
}

/// Resolve `https://{host}` from the target or the connection string endpoint
fn resolve_namespace_url(target: &QueueTarget, authorizer: &Authorizer) -> QueueResult<String> {
    if let Some(namespace) = target.namespace.as_deref().filter(|ns| !ns.trim().is_empty()) {
        let host = namespace
            .trim()
            .trim_start_matches("sb://")
            .trim_start_matches("https://")
            .trim_end_matches('/');
        return Ok(format!("https://{host}"));
    }

    match authorizer {
        Authorizer::SharedAccessSignature(parts) => Ok(parts.endpoint.clone()),
        Authorizer::Token(_) => Err(QueueError::configuration(
            "a namespace is required when authenticating with a bearer token",
        )),
    }
}

/// One peek-lock session against a Service Bus queue
#[derive(Debug)]
pub struct ServiceBusSession {
    http_client: HttpClient,
    queue_url: String,
    queue_name: String,
    authorizer: Authorizer,
}

impl ServiceBusSession {
    fn authorization(&self) -> QueueResult<String> {
        self.authorizer.authorization_header(&self.queue_url)
    }

    /// Lock the head message, waiting up to `wait` on the server
    async fn receive_one(&self, wait: Duration) -> QueueResult<Option<QueueMessage>> {
        let wait_seconds = wait.as_secs_f64().ceil() as u64;
        let url = format!("{}/messages/head?timeout={}", self.queue_url, wait_seconds);

        let response = self
            .http_client
            .post(&url)
            .header(header::AUTHORIZATION, self.authorization()?)
            .header(header::CONTENT_LENGTH, 0)
            .timeout(Duration::from_secs(wait_seconds) + REQUEST_GRACE)
            .send()
            .await
            .map_err(|e| QueueError::receive(&self.queue_name, e.to_string()))?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => {
                let headers = response.headers().clone();
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| QueueError::receive(&self.queue_name, e.to_string()))?;
                parse_received_message(&headers, body.to_vec()).map(Some)
            }
            StatusCode::NO_CONTENT => Ok(None),
            status => Err(self.status_error(status, response.text().await.unwrap_or_default(), "receive")),
        }
    }

    fn status_error(&self, status: StatusCode, body: String, operation: &str) -> QueueError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => QueueError::authentication(format!(
                "{operation} on {} rejected ({status}): {body}",
                self.queue_name
            )),
            StatusCode::NOT_FOUND => {
                QueueError::invalid_target(&self.queue_name, "queue does not exist")
            }
            _ if operation == "peek" => {
                QueueError::peek(&self.queue_name, format!("unexpected status {status}: {body}"))
            }
            _ => QueueError::receive(&self.queue_name, format!("unexpected status {status}: {body}")),
        }
    }
}

#[async_trait]
impl QueueReceiver for ServiceBusSession {
    async fn receive(
        &mut self,
        max_count: usize,
        timeout: Duration,
    ) -> QueueResult<Vec<QueueMessage>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut batch = Vec::new();

        while batch.len() < max_count {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            // Once something has arrived, only drain what is already waiting
            let wait = if batch.is_empty() {
                remaining
            } else {
                Duration::ZERO
            };

            match self.receive_one(wait).await? {
                Some(message) => batch.push(message),
                None => break,
            }

            if remaining.is_zero() {
                break;
            }
        }

        debug!(
            queue_name = %self.queue_name,
            count = batch.len(),
            "📥 Received messages from Service Bus"
        );
        Ok(batch)
    }

    async fn acknowledge(&mut self, message: &QueueMessage) -> QueueResult<()> {
        let display_id = message.display_id();
        let (Some(message_id), Some(lock_token)) = (&message.message_id, &message.lock_token)
        else {
            return Err(QueueError::acknowledge(
                display_id,
                "message carries no message id or lock token",
            ));
        };

        let url = format!(
            "{}/messages/{}/{}",
            self.queue_url,
            urlencoding::encode(message_id),
            urlencoding::encode(lock_token)
        );

        let response = self
            .http_client
            .delete(&url)
            .header(header::AUTHORIZATION, self.authorization()?)
            .timeout(SHORT_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| QueueError::acknowledge(&display_id, e.to_string()))?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(QueueError::acknowledge(
                display_id,
                "lock lost or message already completed",
            )),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(QueueError::acknowledge(
                    display_id,
                    format!("complete rejected ({status}): {body}"),
                ))
            }
        }
    }

    async fn peek(&mut self, _count: usize) -> QueueResult<Vec<QueueMessage>> {
        let url = format!(
            "{}?api-version={}",
            self.queue_url,
            service_bus::ENTITY_API_VERSION
        );

        let response = self
            .http_client
            .get(&url)
            .header(header::AUTHORIZATION, self.authorization()?)
            .timeout(SHORT_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| QueueError::peek(&self.queue_name, e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| QueueError::peek(&self.queue_name, e.to_string()))?;
                check_entity_description(&self.queue_name, &body)?;
                Ok(Vec::new())
            }
            status => Err(self.status_error(status, response.text().await.unwrap_or_default(), "peek")),
        }
    }

    fn close(&mut self) -> QueueResult<()> {
        // REST sessions hold no server-side link; outstanding locks expire on their own
        Ok(())
    }
}

/// Classify the Atom document returned by an entity GET.
///
/// An existing queue comes back as an `<entry>`; a missing one as a 200 with
/// an empty `<feed>`.
pub(crate) fn check_entity_description(queue_name: &str, body: &str) -> QueueResult<()> {
    if body.contains("<entry") {
        Ok(())
    } else {
        Err(QueueError::invalid_target(queue_name, "queue does not exist"))
    }
}

/// `BrokerProperties` header of a peek-locked message
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BrokerProperties {
    message_id: Option<String>,
    lock_token: Option<String>,
    sequence_number: Option<i64>,
    enqueued_time_utc: Option<String>,
    correlation_id: Option<String>,
    #[serde(default)]
    delivery_count: u32,
}

/// Build a [`QueueMessage`] from a peek-lock response
pub(crate) fn parse_received_message(
    headers: &HeaderMap,
    body: Vec<u8>,
) -> QueueResult<QueueMessage> {
    let broker: BrokerProperties = headers
        .get("brokerproperties")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| QueueError::internal("response is missing the BrokerProperties header"))
        .and_then(|raw| {
            serde_json::from_str(raw)
                .map_err(|e| QueueError::internal(format!("invalid BrokerProperties header: {e}")))
        })?;

    let enqueued_time = broker
        .enqueued_time_utc
        .as_deref()
        .and_then(parse_broker_time);
    if broker.enqueued_time_utc.is_some() && enqueued_time.is_none() {
        warn!(
            value = ?broker.enqueued_time_utc,
            "Unparseable EnqueuedTimeUtc; leaving enqueued time empty"
        );
    }

    Ok(QueueMessage {
        body: MessageBody::Binary(body),
        message_id: broker.message_id,
        enqueued_time,
        sequence_number: broker.sequence_number,
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        correlation_id: broker.correlation_id,
        application_properties: application_properties(headers),
        lock_token: broker.lock_token,
        delivery_count: broker.delivery_count,
    })
}

/// Broker timestamps use RFC 1123 (`Wed, 05 Dec 2012 20:47:58 GMT`)
fn parse_broker_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|time| time.with_timezone(&Utc))
        .ok()
}

/// Custom headers carry application properties as JSON scalars
fn application_properties(headers: &HeaderMap) -> Map<String, Value> {
    headers
        .iter()
        .filter(|(name, _)| !service_bus::STANDARD_HEADERS.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            let raw = value.to_str().ok()?;
            let parsed = match serde_json::from_str::<Value>(raw) {
                Ok(scalar) if !scalar.is_object() && !scalar.is_array() => scalar,
                _ => Value::String(raw.to_string()),
            };
            Some((name.as_str().to_string(), parsed))
        })
        .collect()
}
