//! PostgreSQL push subscription store.
//!
//! Rows live in `push_subscriptions` with a unique index on
//! (user_id, endpoint); the upsert rides on `ON CONFLICT DO UPDATE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

use super::{
    NewPushSubscription, PushSubscription, PushSubscriptionStore, SubscribeAction,
    SubscribeOutcome,
};

/// PostgreSQL push subscription store.
pub struct PostgresPushSubscriptionStore {
    pool: PgPool,
}

impl PostgresPushSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type SubscriptionRow = (
    Uuid,
    i64,
    String,
    String,
    String,
    serde_json::Value,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn row_to_subscription(row: SubscriptionRow) -> PushSubscription {
    let (id, user_id, endpoint, p256dh, auth, payload, active, created_at, updated_at) = row;
    PushSubscription {
        id,
        user_id,
        endpoint,
        p256dh,
        auth,
        payload,
        active,
        created_at,
        updated_at,
    }
}

#[async_trait]
impl PushSubscriptionStore for PostgresPushSubscriptionStore {
    async fn upsert(
        &self,
        user_id: i64,
        subscription: NewPushSubscription,
    ) -> Result<SubscribeOutcome> {
        // xmax = 0 distinguishes a fresh insert from a conflict update
        let (id, inserted): (Uuid, bool) = sqlx::query_as(
            r#"
            INSERT INTO push_subscriptions
                (id, user_id, endpoint, p256dh, auth, payload, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, NOW(), NOW())
            ON CONFLICT (user_id, endpoint) DO UPDATE
                SET p256dh = EXCLUDED.p256dh,
                    auth = EXCLUDED.auth,
                    payload = EXCLUDED.payload,
                    active = TRUE,
                    updated_at = NOW()
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&subscription.endpoint)
        .bind(&subscription.p256dh)
        .bind(&subscription.auth)
        .bind(&subscription.payload)
        .fetch_one(&self.pool)
        .await?;

        let action = if inserted {
            SubscribeAction::Created
        } else {
            SubscribeAction::Updated
        };

        tracing::debug!(
            user_id = user_id,
            subscription_id = %id,
            action = ?action,
            "Push subscription upserted"
        );

        Ok(SubscribeOutcome {
            subscription_id: id,
            action,
        })
    }

    async fn active_for_user(&self, user_id: i64) -> Result<Vec<PushSubscription>> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, endpoint, p256dh, auth, payload, active, created_at, updated_at
            FROM push_subscriptions
            WHERE user_id = $1 AND active = TRUE
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_subscription).collect())
    }

    async fn deactivate(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE push_subscriptions SET active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        tracing::debug!(subscription_id = %id, "Push subscription deactivated");
        Ok(())
    }

    async fn deactivate_endpoint(&self, user_id: i64, endpoint: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE push_subscriptions
            SET active = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND endpoint = $2 AND active = TRUE
            "#,
        )
        .bind(user_id)
        .bind(endpoint)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn deactivate_all(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE push_subscriptions
            SET active = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND active = TRUE
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
