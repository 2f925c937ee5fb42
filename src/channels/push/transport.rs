//! Push delivery transport.
//!
//! One POST per subscription endpoint, carrying the VAPID authorization and
//! the message payload. The transport reports a three-way outcome so the
//! channel can distinguish "endpoint permanently gone" from ordinary
//! failures.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::config::PushConfig;
use crate::error::{NotificationError, Result};
use crate::subscriptions::PushSubscription;

use super::vapid::VapidSigner;

/// Payload delivered to each subscription.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Per-subscription delivery outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The provider reported the endpoint permanently gone (404/410); the
    /// subscription should be deactivated.
    Gone,
    Failed(String),
}

/// Trait for push delivery transports.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn deliver(&self, subscription: &PushSubscription, message: &PushMessage) -> DeliveryOutcome;
}

/// Web-push transport: VAPID-signed POSTs to each subscription endpoint.
pub struct WebPushTransport {
    client: Client,
    signer: Option<VapidSigner>,
    ttl_seconds: u32,
}

impl WebPushTransport {
    /// Build the transport from configuration. Missing VAPID keys leave the
    /// transport constructed but unable to deliver, so a deployment without
    /// push credentials degrades to per-call failures instead of refusing to
    /// boot.
    pub fn new(config: &PushConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                NotificationError::Configuration(format!("failed to build push client: {}", e))
            })?;

        let signer = if config.vapid_private_key_pem.is_empty() {
            tracing::warn!("VAPID keys not configured; push deliveries will fail");
            None
        } else {
            Some(VapidSigner::new(
                &config.vapid_private_key_pem,
                &config.vapid_public_key,
                &config.subject,
            )?)
        };

        Ok(Self {
            client,
            signer,
            ttl_seconds: config.ttl_seconds,
        })
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn deliver(&self, subscription: &PushSubscription, message: &PushMessage) -> DeliveryOutcome {
        let Some(signer) = &self.signer else {
            return DeliveryOutcome::Failed("push signing not configured".to_string());
        };

        let authorization = match signer.authorization(&subscription.endpoint) {
            Ok(value) => value,
            Err(e) => return DeliveryOutcome::Failed(e.to_string()),
        };

        let response = self
            .client
            .post(&subscription.endpoint)
            .header("Authorization", authorization)
            .header("TTL", self.ttl_seconds.to_string())
            .header("Urgency", "normal")
            .json(message)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    DeliveryOutcome::Delivered
                } else if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
                    DeliveryOutcome::Gone
                } else {
                    DeliveryOutcome::Failed(format!("push service returned {}", status))
                }
            }
            Err(e) => DeliveryOutcome::Failed(format!("push request failed: {}", e)),
        }
    }
}

/// Scriptable transport for tests: endpoints can be marked gone or failing,
/// everything else is delivered and recorded.
pub struct MockPushTransport {
    gone_endpoints: Mutex<HashSet<String>>,
    failing_endpoints: Mutex<HashSet<String>>,
    delivered: Mutex<Vec<(String, PushMessage)>>,
}

impl MockPushTransport {
    pub fn new() -> Self {
        Self {
            gone_endpoints: Mutex::new(HashSet::new()),
            failing_endpoints: Mutex::new(HashSet::new()),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn mark_gone(&self, endpoint: &str) {
        self.gone_endpoints.lock().unwrap().insert(endpoint.to_string());
    }

    pub fn mark_failing(&self, endpoint: &str) {
        self.failing_endpoints.lock().unwrap().insert(endpoint.to_string());
    }

    pub fn delivered(&self) -> Vec<(String, PushMessage)> {
        self.delivered.lock().unwrap().clone()
    }
}

impl Default for MockPushTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushTransport for MockPushTransport {
    async fn deliver(&self, subscription: &PushSubscription, message: &PushMessage) -> DeliveryOutcome {
        if self.gone_endpoints.lock().unwrap().contains(&subscription.endpoint) {
            return DeliveryOutcome::Gone;
        }
        if self.failing_endpoints.lock().unwrap().contains(&subscription.endpoint) {
            return DeliveryOutcome::Failed("mock failure".to_string());
        }

        self.delivered
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), message.clone()));
        DeliveryOutcome::Delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization_omits_absent_fields() {
        let message = PushMessage {
            title: "Hello".to_string(),
            body: "World".to_string(),
            action_url: None,
            icon: None,
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["title"], "Hello");
        assert!(json.get("action_url").is_none());
        assert!(json.get("icon").is_none());
    }

    #[test]
    fn test_transport_without_keys_constructs() {
        let config = PushConfig::default();
        let transport = WebPushTransport::new(&config).unwrap();
        assert!(transport.signer.is_none());
    }
}
