//! Push channel adapter.
//!
//! Delivers one signed payload per active subscription, best-effort and
//! at-most-once: a failed delivery is counted and dropped, and an endpoint
//! the provider reports permanently gone is deactivated individually. Also
//! owns the subscription lifecycle (subscribe/unsubscribe upserts).

mod transport;
mod vapid;

pub use transport::{DeliveryOutcome, MockPushTransport, PushMessage, PushTransport, WebPushTransport};
pub use vapid::VapidSigner;

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::error::Result;
use crate::metrics::PushMetrics;
use crate::subscriptions::{NewPushSubscription, PushSubscriptionStore, SubscribeOutcome};

/// Aggregate outcome of one push send across a user's subscriptions.
#[derive(Debug, Clone, Serialize)]
pub struct PushSendResult {
    pub success: bool,
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
}

/// Push channel adapter.
pub struct PushChannel {
    subscriptions: Arc<dyn PushSubscriptionStore>,
    transport: Arc<dyn PushTransport>,
}

impl PushChannel {
    pub fn new(
        subscriptions: Arc<dyn PushSubscriptionStore>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            subscriptions,
            transport,
        }
    }

    /// Deliver a push message to every active subscription of a user.
    ///
    /// Zero active subscriptions is a success with `sent = 0`. Failures are
    /// per-subscription and independent; there is no retry inside the call.
    #[tracing::instrument(name = "push.send", skip(self, title, body, action_url, icon))]
    pub async fn send(
        &self,
        user_id: i64,
        title: &str,
        body: &str,
        action_url: Option<&str>,
        icon: Option<&str>,
    ) -> Result<PushSendResult> {
        let subscriptions = self.subscriptions.active_for_user(user_id).await?;
        let total = subscriptions.len();

        if subscriptions.is_empty() {
            tracing::debug!(user_id = user_id, "No active push subscriptions");
            return Ok(PushSendResult {
                success: true,
                sent: 0,
                failed: 0,
                total: 0,
            });
        }

        let message = PushMessage {
            title: title.to_string(),
            body: body.to_string(),
            action_url: action_url.map(|s| s.to_string()),
            icon: icon.map(|s| s.to_string()),
        };

        // Deliver to all subscriptions concurrently; each outcome is its own
        let outcomes = join_all(subscriptions.iter().map(|subscription| {
            let message = &message;
            async move {
                let outcome = self.transport.deliver(subscription, message).await;
                (subscription, outcome)
            }
        }))
        .await;

        let mut sent = 0;
        let mut failed = 0;

        for (subscription, outcome) in outcomes {
            match outcome {
                DeliveryOutcome::Delivered => sent += 1,
                DeliveryOutcome::Gone => {
                    failed += 1;
                    tracing::info!(
                        subscription_id = %subscription.id,
                        user_id = user_id,
                        "Push endpoint gone, deactivating subscription"
                    );
                    if let Err(e) = self.subscriptions.deactivate(subscription.id).await {
                        tracing::warn!(
                            subscription_id = %subscription.id,
                            error = %e,
                            "Failed to deactivate gone subscription"
                        );
                    } else {
                        PushMetrics::record_deactivated();
                    }
                }
                DeliveryOutcome::Failed(error) => {
                    failed += 1;
                    tracing::debug!(
                        subscription_id = %subscription.id,
                        user_id = user_id,
                        error = %error,
                        "Push delivery failed, dropping"
                    );
                }
            }
        }

        PushMetrics::record_sent(sent as u64);
        PushMetrics::record_failed(failed as u64);

        tracing::debug!(
            user_id = user_id,
            sent = sent,
            failed = failed,
            total = total,
            "Push send completed"
        );

        Ok(PushSendResult {
            success: failed == 0 || sent > 0,
            sent,
            failed,
            total,
        })
    }

    /// Register (or refresh) a subscription from the browser payload.
    pub async fn subscribe(
        &self,
        user_id: i64,
        payload: serde_json::Value,
    ) -> Result<SubscribeOutcome> {
        let subscription = NewPushSubscription::from_payload(payload)?;
        let outcome = self.subscriptions.upsert(user_id, subscription).await?;

        tracing::info!(
            user_id = user_id,
            subscription_id = %outcome.subscription_id,
            action = ?outcome.action,
            "Push subscription registered"
        );

        Ok(outcome)
    }

    /// Deactivate one endpoint, or all of the user's subscriptions when no
    /// endpoint is given. Returns the number of subscriptions deactivated.
    pub async fn unsubscribe(&self, user_id: i64, endpoint: Option<&str>) -> Result<u64> {
        let deactivated = match endpoint {
            Some(endpoint) => {
                self.subscriptions
                    .deactivate_endpoint(user_id, endpoint)
                    .await?
            }
            None => self.subscriptions.deactivate_all(user_id).await?,
        };

        tracing::info!(
            user_id = user_id,
            deactivated = deactivated,
            "Push unsubscribe processed"
        );

        Ok(deactivated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::MemoryPushSubscriptionStore;
    use serde_json::json;

    fn payload(endpoint: &str) -> serde_json::Value {
        json!({
            "endpoint": endpoint,
            "keys": {"p256dh": "pub", "auth": "secret"}
        })
    }

    fn channel() -> (PushChannel, Arc<MemoryPushSubscriptionStore>, Arc<MockPushTransport>) {
        let store = Arc::new(MemoryPushSubscriptionStore::new());
        let transport = Arc::new(MockPushTransport::new());
        let channel = PushChannel::new(store.clone(), transport.clone());
        (channel, store, transport)
    }

    #[tokio::test]
    async fn test_zero_subscriptions_is_success() {
        let (channel, _store, _transport) = channel();

        let result = channel.send(1, "Hello", "World", None, None).await.unwrap();
        assert!(result.success);
        assert_eq!(result.sent, 0);
        assert_eq!(result.total, 0);
    }

    #[tokio::test]
    async fn test_delivers_to_all_active_subscriptions() {
        let (channel, _store, transport) = channel();
        channel.subscribe(1, payload("https://p.example/a")).await.unwrap();
        channel.subscribe(1, payload("https://p.example/b")).await.unwrap();

        let result = channel
            .send(1, "Hello", "World", Some("/bookings/1"), Some("bell"))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.sent, 2);
        assert_eq!(result.failed, 0);
        assert_eq!(transport.delivered().len(), 2);
    }

    #[tokio::test]
    async fn test_gone_deactivates_only_that_subscription() {
        let (channel, store, transport) = channel();
        channel.subscribe(1, payload("https://p.example/a")).await.unwrap();
        channel.subscribe(1, payload("https://p.example/b")).await.unwrap();
        transport.mark_gone("https://p.example/a");

        let result = channel.send(1, "Hello", "World", None, None).await.unwrap();
        assert_eq!(result.sent, 1);
        assert_eq!(result.failed, 1);

        // The other subscription is untouched
        let active = store.active_for_user(1).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].endpoint, "https://p.example/b");
    }

    #[tokio::test]
    async fn test_failure_is_dropped_without_deactivation() {
        let (channel, store, transport) = channel();
        channel.subscribe(1, payload("https://p.example/a")).await.unwrap();
        transport.mark_failing("https://p.example/a");

        let result = channel.send(1, "Hello", "World", None, None).await.unwrap();
        assert_eq!(result.sent, 0);
        assert_eq!(result.failed, 1);
        assert!(!result.success);

        // A transient failure never deactivates the subscription
        assert_eq!(store.active_for_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_endpoint_and_all() {
        let (channel, store, _transport) = channel();
        channel.subscribe(1, payload("https://p.example/a")).await.unwrap();
        channel.subscribe(1, payload("https://p.example/b")).await.unwrap();

        let removed = channel
            .unsubscribe(1, Some("https://p.example/a"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.active_for_user(1).await.unwrap().len(), 1);

        let removed = channel.unsubscribe(1, None).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.active_for_user(1).await.unwrap().is_empty());
    }
}
