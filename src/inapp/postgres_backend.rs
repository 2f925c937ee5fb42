//! PostgreSQL in-app notification store.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::metrics::INAPP_CREATED_TOTAL;

use super::{InAppNotificationStore, NewInAppNotification};

/// PostgreSQL in-app notification store backed by `in_app_notifications`.
pub struct PostgresInAppStore {
    pool: PgPool,
}

impl PostgresInAppStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InAppNotificationStore for PostgresInAppStore {
    async fn insert(&self, notification: NewInAppNotification) -> Result<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO in_app_notifications
                (id, user_id, type_key, title, message, related_id, related_type,
                 action_url, icon, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            "#,
        )
        .bind(id)
        .bind(notification.user_id)
        .bind(&notification.type_key)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.related_id)
        .bind(&notification.related_type)
        .bind(&notification.action_url)
        .bind(&notification.icon)
        .execute(&self.pool)
        .await?;

        INAPP_CREATED_TOTAL.inc();

        tracing::debug!(
            notification_id = %id,
            user_id = notification.user_id,
            type_key = %notification.type_key,
            "In-app notification persisted"
        );

        Ok(id)
    }
}
