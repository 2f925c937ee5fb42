//! In-memory in-app notification store.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::metrics::INAPP_CREATED_TOTAL;

use super::{InAppNotification, InAppNotificationStore, NewInAppNotification};

/// In-memory in-app notification store.
pub struct MemoryInAppStore {
    notifications: DashMap<Uuid, InAppNotification>,
}

impl MemoryInAppStore {
    pub fn new() -> Self {
        Self {
            notifications: DashMap::new(),
        }
    }

    /// Records for a user, newest first. Test/dev helper; the product
    /// surface reads through its own path.
    pub fn for_user(&self, user_id: i64) -> Vec<InAppNotification> {
        let mut records: Vec<InAppNotification> = self
            .notifications
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub fn count(&self) -> usize {
        self.notifications.len()
    }
}

impl Default for MemoryInAppStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InAppNotificationStore for MemoryInAppStore {
    async fn insert(&self, notification: NewInAppNotification) -> Result<Uuid> {
        let row = InAppNotification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            type_key: notification.type_key,
            title: notification.title,
            message: notification.message,
            related_id: notification.related_id,
            related_type: notification.related_type,
            action_url: notification.action_url,
            icon: notification.icon,
            created_at: Utc::now(),
            read_at: None,
        };
        let id = row.id;
        self.notifications.insert(id, row);

        INAPP_CREATED_TOTAL.inc();
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_list() {
        let store = MemoryInAppStore::new();

        let id = store
            .insert(NewInAppNotification {
                user_id: 1,
                type_key: "booking_created".to_string(),
                title: "New booking request".to_string(),
                message: "Ada requested a DJ set".to_string(),
                related_id: Some(42),
                related_type: Some("booking".to_string()),
                action_url: Some("/bookings/42".to_string()),
                icon: Some("calendar-plus".to_string()),
            })
            .await
            .unwrap();

        let records = store.for_user(1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].related_id, Some(42));
        assert!(records[0].read_at.is_none());
    }
}
