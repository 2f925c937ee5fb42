//! In-memory push subscription store.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::Result;

use super::{
    NewPushSubscription, PushSubscription, PushSubscriptionStore, SubscribeAction,
    SubscribeOutcome,
};

/// In-memory push subscription store keyed by subscription id.
pub struct MemoryPushSubscriptionStore {
    subscriptions: DashMap<Uuid, PushSubscription>,
}

impl MemoryPushSubscriptionStore {
    pub fn new() -> Self {
        Self {
            subscriptions: DashMap::new(),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<PushSubscription> {
        self.subscriptions.get(&id).map(|s| s.clone())
    }
}

impl Default for MemoryPushSubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushSubscriptionStore for MemoryPushSubscriptionStore {
    async fn upsert(
        &self,
        user_id: i64,
        subscription: NewPushSubscription,
    ) -> Result<SubscribeOutcome> {
        let existing_id = self
            .subscriptions
            .iter()
            .find(|entry| {
                entry.user_id == user_id && entry.endpoint == subscription.endpoint
            })
            .map(|entry| entry.id);

        if let Some(id) = existing_id {
            if let Some(mut entry) = self.subscriptions.get_mut(&id) {
                entry.p256dh = subscription.p256dh;
                entry.auth = subscription.auth;
                entry.payload = subscription.payload;
                entry.active = true;
                entry.updated_at = Utc::now();
            }
            return Ok(SubscribeOutcome {
                subscription_id: id,
                action: SubscribeAction::Updated,
            });
        }

        let now = Utc::now();
        let row = PushSubscription {
            id: Uuid::new_v4(),
            user_id,
            endpoint: subscription.endpoint,
            p256dh: subscription.p256dh,
            auth: subscription.auth,
            payload: subscription.payload,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let id = row.id;
        self.subscriptions.insert(id, row);

        Ok(SubscribeOutcome {
            subscription_id: id,
            action: SubscribeAction::Created,
        })
    }

    async fn active_for_user(&self, user_id: i64) -> Result<Vec<PushSubscription>> {
        Ok(self
            .subscriptions
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.active)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn deactivate(&self, id: Uuid) -> Result<()> {
        if let Some(mut entry) = self.subscriptions.get_mut(&id) {
            entry.active = false;
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn deactivate_endpoint(&self, user_id: i64, endpoint: &str) -> Result<u64> {
        let mut affected = 0;
        for mut entry in self.subscriptions.iter_mut() {
            if entry.user_id == user_id && entry.endpoint == endpoint && entry.active {
                entry.active = false;
                entry.updated_at = Utc::now();
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn deactivate_all(&self, user_id: i64) -> Result<u64> {
        let mut affected = 0;
        for mut entry in self.subscriptions.iter_mut() {
            if entry.user_id == user_id && entry.active {
                entry.active = false;
                entry.updated_at = Utc::now();
                affected += 1;
            }
        }
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subscription(endpoint: &str) -> NewPushSubscription {
        NewPushSubscription {
            endpoint: endpoint.to_string(),
            p256dh: "pub".to_string(),
            auth: "secret".to_string(),
            payload: json!({"endpoint": endpoint}),
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let store = MemoryPushSubscriptionStore::new();

        let first = store.upsert(1, subscription("https://p.example/a")).await.unwrap();
        assert_eq!(first.action, SubscribeAction::Created);

        let second = store.upsert(1, subscription("https://p.example/a")).await.unwrap();
        assert_eq!(second.action, SubscribeAction::Updated);
        assert_eq!(second.subscription_id, first.subscription_id);

        // Same endpoint for a different user is a separate subscription
        let other = store.upsert(2, subscription("https://p.example/a")).await.unwrap();
        assert_eq!(other.action, SubscribeAction::Created);
    }

    #[tokio::test]
    async fn test_upsert_reactivates() {
        let store = MemoryPushSubscriptionStore::new();
        let outcome = store.upsert(1, subscription("https://p.example/a")).await.unwrap();

        store.deactivate(outcome.subscription_id).await.unwrap();
        assert!(store.active_for_user(1).await.unwrap().is_empty());

        store.upsert(1, subscription("https://p.example/a")).await.unwrap();
        assert_eq!(store.active_for_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deactivate_is_individual() {
        let store = MemoryPushSubscriptionStore::new();
        let a = store.upsert(1, subscription("https://p.example/a")).await.unwrap();
        store.upsert(1, subscription("https://p.example/b")).await.unwrap();

        store.deactivate(a.subscription_id).await.unwrap();

        let active = store.active_for_user(1).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].endpoint, "https://p.example/b");

        // The deactivated row still exists, soft-flagged
        assert!(!store.get(a.subscription_id).unwrap().active);
    }

    #[tokio::test]
    async fn test_deactivate_all() {
        let store = MemoryPushSubscriptionStore::new();
        store.upsert(1, subscription("https://p.example/a")).await.unwrap();
        store.upsert(1, subscription("https://p.example/b")).await.unwrap();
        store.upsert(2, subscription("https://p.example/c")).await.unwrap();

        let affected = store.deactivate_all(1).await.unwrap();
        assert_eq!(affected, 2);
        assert!(store.active_for_user(1).await.unwrap().is_empty());
        assert_eq!(store.active_for_user(2).await.unwrap().len(), 1);
    }
}
