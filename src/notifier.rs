//! Outbound invitation delivery
//!
//! Delivery is fire-and-forget with at-least-once semantics: callers never
//! wait on it and a failure never undoes the write that triggered it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};

/// Template used for co-host invitation emails
pub const INVITATION_TEMPLATE: &str = "co_host_invitation";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &str, template_id: &str, payload: serde_json::Value) -> Result<()>;
}

/// Request body accepted by the mail service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    pub to: String,
    pub template_id: String,
    pub payload: serde_json::Value,
}

/// Posts notifications to an HTTP mail service
pub struct WebhookNotifier {
    client: Client,
    base_url: String,
}

impl WebhookNotifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, email: &str, template_id: &str, payload: serde_json::Value) -> Result<()> {
        let request = SendRequest {
            to: email.to_string(),
            template_id: template_id.to_string(),
            payload,
        };

        let response = self
            .client
            .post(format!("{}/send", self.base_url.trim_end_matches('/')))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Notifier(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Notifier(format!(
                "Failed to send {}: {} - {}",
                template_id, status, text
            )));
        }

        Ok(())
    }
}

/// Writes notifications to the log. Used when no mail service is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: &str, template_id: &str, payload: serde_json::Value) -> Result<()> {
        let payload = redacted(payload);
        tracing::info!(%email, %template_id, %payload, "notification (log only)");
        Ok(())
    }
}

/// Strip the bearer token from the acceptance link so it never reaches the log
fn redacted(mut payload: serde_json::Value) -> serde_json::Value {
    if let Some(url) = payload.get_mut("accept_url") {
        if let Some((base, _token)) = url.as_str().and_then(|u| u.rsplit_once('/')) {
            *url = serde_json::Value::String(format!("{}/<redacted>", base));
        }
    }
    payload
}

/// Deliver in the background. Failures are logged, never returned.
pub fn dispatch(
    notifier: Arc<dyn Notifier>,
    email: String,
    template_id: &'static str,
    payload: serde_json::Value,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&email, template_id, payload).await {
            tracing::warn!(%email, %template_id, "notification failed: {}", e);
        }
    })
}
