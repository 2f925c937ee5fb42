//! In-app channel adapter.
//!
//! Thin layer over the in-app store: persists a rendered record and returns
//! its id. Delivery confirmation and read tracking belong to the product
//! surface consuming the records.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::inapp::{InAppNotificationStore, NewInAppNotification};

/// Outcome of persisting an in-app notification.
#[derive(Debug, Clone, Serialize)]
pub struct InAppResult {
    pub success: bool,
    pub notification_id: Uuid,
}

/// In-app channel adapter.
pub struct InAppChannel {
    store: Arc<dyn InAppNotificationStore>,
}

impl InAppChannel {
    pub fn new(store: Arc<dyn InAppNotificationStore>) -> Self {
        Self { store }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        user_id: i64,
        type_key: &str,
        title: &str,
        message: &str,
        related_id: Option<i64>,
        related_type: Option<&str>,
        action_url: Option<&str>,
        icon: Option<&str>,
    ) -> Result<InAppResult> {
        let notification_id = self
            .store
            .insert(NewInAppNotification {
                user_id,
                type_key: type_key.to_string(),
                title: title.to_string(),
                message: message.to_string(),
                related_id,
                related_type: related_type.map(|s| s.to_string()),
                action_url: action_url.map(|s| s.to_string()),
                icon: icon.map(|s| s.to_string()),
            })
            .await?;

        tracing::debug!(
            user_id = user_id,
            type_key = %type_key,
            notification_id = %notification_id,
            "In-app notification created"
        );

        Ok(InAppResult {
            success: true,
            notification_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inapp::MemoryInAppStore;

    #[tokio::test]
    async fn test_create_persists_record() {
        let store = Arc::new(MemoryInAppStore::new());
        let channel = InAppChannel::new(store.clone());

        let result = channel
            .create(
                7,
                "booking_created",
                "New booking request",
                "Grace requested a DJ set",
                Some(42),
                Some("booking"),
                Some("/bookings/42"),
                Some("calendar-plus"),
            )
            .await
            .unwrap();

        assert!(result.success);
        let records = store.for_user(7);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, result.notification_id);
        assert_eq!(records[0].type_key, "booking_created");
    }
}
