//! PostgreSQL delivery log.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

use super::{DeliveryLogStore, NewDeliveryLogEntry};

/// PostgreSQL delivery log backed by `email_delivery_log`.
pub struct PostgresDeliveryLog {
    pool: PgPool,
}

impl PostgresDeliveryLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryLogStore for PostgresDeliveryLog {
    async fn append(&self, entry: NewDeliveryLogEntry) -> Result<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO email_delivery_log
                (id, template_key, recipient, subject, status, provider, error, html_body, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            "#,
        )
        .bind(id)
        .bind(&entry.template_key)
        .bind(&entry.recipient)
        .bind(&entry.subject)
        .bind(entry.status.as_str())
        .bind(&entry.provider)
        .bind(&entry.error)
        .bind(&entry.html_body)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }
}
