//! Notification sink: fan-out of messages to a group's member devices.
//!
//! Delivery is best-effort. A failed notification is logged and never blocks
//! or rolls back the state change that produced it.

use std::time::Duration;

use async_trait::async_trait;
use chama_types::GroupId;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notification {
    pub group: GroupId,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

impl Notification {
    pub fn new(group: GroupId, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            group,
            title: title.into(),
            body: body.into(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("notification request failed: {0}")]
    RequestFailed(String),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Deliver `notification`, logging instead of propagating a failure.
pub async fn notify_best_effort(sink: &dyn NotificationSink, notification: &Notification) {
    if let Err(e) = sink.notify(notification).await {
        warn!(group = %notification.group, title = %notification.title, error = %e, "notification not delivered");
    }
}

/// Writes notifications to the log. Used when no push gateway is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(group = %notification.group, title = %notification.title, body = %notification.body, "notification");
        Ok(())
    }
}

/// Posts each notification as JSON to a push gateway.
///
/// `POST {endpoint}` with body `{"group": .., "title": .., "body": .., "data": ..}`.
pub struct WebhookNotifier {
    endpoint: String,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            endpoint: endpoint.into(),
            http_client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Unreachable(format!("request timed out: {e}"))
                } else if e.is_connect() {
                    NotifyError::Unreachable(format!("connection failed: {e}"))
                } else {
                    NotifyError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(NotifyError::RequestFailed(format!(
                "HTTP status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
