//! Push subscription storage.
//!
//! A subscription is unique per (user, endpoint); re-subscribing the same
//! endpoint upserts in place and re-activates it. Deactivation is a soft
//! flag set per subscription; delivery failures never delete rows or touch
//! a user's other subscriptions.

mod memory_backend;
mod postgres_backend;

pub use memory_backend::MemoryPushSubscriptionStore;
pub use postgres_backend::PostgresPushSubscriptionStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{NotificationError, Result};

/// A stored web-push subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: i64,
    pub endpoint: String,
    /// Client public key (p256dh)
    pub p256dh: String,
    /// Client auth secret
    pub auth: String,
    /// Raw subscription payload as handed over by the browser
    pub payload: serde_json::Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for registering a subscription.
#[derive(Debug, Clone)]
pub struct NewPushSubscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub payload: serde_json::Value,
}

impl NewPushSubscription {
    /// Parse the browser's subscription JSON
    /// (`{endpoint, keys: {p256dh, auth}}`).
    pub fn from_payload(payload: serde_json::Value) -> Result<Self> {
        let endpoint = payload
            .get("endpoint")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                NotificationError::Configuration(
                    "push subscription payload missing endpoint".to_string(),
                )
            })?
            .to_string();

        let keys = payload.get("keys").ok_or_else(|| {
            NotificationError::Configuration("push subscription payload missing keys".to_string())
        })?;

        let p256dh = keys
            .get("p256dh")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                NotificationError::Configuration(
                    "push subscription payload missing p256dh key".to_string(),
                )
            })?
            .to_string();

        let auth = keys
            .get("auth")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                NotificationError::Configuration(
                    "push subscription payload missing auth secret".to_string(),
                )
            })?
            .to_string();

        Ok(Self {
            endpoint,
            p256dh,
            auth,
            payload,
        })
    }
}

/// Whether an upsert created a new row or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscribeAction {
    Created,
    Updated,
}

/// Result of registering a subscription.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeOutcome {
    pub subscription_id: Uuid,
    pub action: SubscribeAction,
}

/// Storage backend for push subscriptions.
#[async_trait]
pub trait PushSubscriptionStore: Send + Sync {
    /// Insert or refresh the subscription for (user, endpoint). Refreshing
    /// re-activates a previously deactivated subscription.
    async fn upsert(
        &self,
        user_id: i64,
        subscription: NewPushSubscription,
    ) -> Result<SubscribeOutcome>;

    /// All active subscriptions for a user.
    async fn active_for_user(&self, user_id: i64) -> Result<Vec<PushSubscription>>;

    /// Soft-deactivate a single subscription by id.
    async fn deactivate(&self, id: Uuid) -> Result<()>;

    /// Deactivate one endpoint for a user; returns the number of rows
    /// affected.
    async fn deactivate_endpoint(&self, user_id: i64, endpoint: &str) -> Result<u64>;

    /// Deactivate all of a user's subscriptions; returns the number of rows
    /// affected.
    async fn deactivate_all(&self, user_id: i64) -> Result<u64>;
}

/// Create a subscription store based on configuration.
pub fn create_subscription_store(
    settings: &StorageConfig,
    pool: Option<PgPool>,
) -> Arc<dyn PushSubscriptionStore> {
    match (settings.backend.as_str(), pool) {
        ("postgres", Some(pool)) => {
            tracing::info!(backend = "postgres", "Creating PostgreSQL subscription store");
            Arc::new(PostgresPushSubscriptionStore::new(pool))
        }
        ("postgres", None) => {
            tracing::warn!("Postgres subscription store requested but no pool available, using memory");
            Arc::new(MemoryPushSubscriptionStore::new())
        }
        _ => {
            tracing::info!(backend = "memory", "Creating in-memory subscription store");
            Arc::new(MemoryPushSubscriptionStore::new())
        }
    }
}
