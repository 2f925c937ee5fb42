//! PostgreSQL email queue backend.
//!
//! Rows live in the `email_queue` table with JSONB variable and metadata
//! columns. The claim is a single atomic statement: `FOR UPDATE SKIP LOCKED`
//! inside an `UPDATE … RETURNING`, so concurrent pollers can never claim the
//! same row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{NotificationError, Result};
use crate::metrics::QueueMetrics;

use super::backend::{validate_new_email, EmailQueueStore};
use super::models::{EmailStatus, NewQueuedEmail, QueuePage, QueuedEmail, StatusCount};

/// PostgreSQL email queue backend.
pub struct PostgresQueueBackend {
    pool: PgPool,
}

impl PostgresQueueBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct QueuedEmailRow {
    id: Uuid,
    template_key: String,
    recipient_email: String,
    recipient_name: String,
    variables: serde_json::Value,
    scheduled_at: DateTime<Utc>,
    priority: i32,
    status: String,
    claimed_at: Option<DateTime<Utc>>,
    user_id: Option<i64>,
    booking_id: Option<i64>,
    category: Option<String>,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    error: Option<String>,
    cancelled_by: Option<String>,
    cancel_reason: Option<String>,
}

impl TryFrom<QueuedEmailRow> for QueuedEmail {
    type Error = NotificationError;

    fn try_from(row: QueuedEmailRow) -> Result<Self> {
        let status = EmailStatus::parse(&row.status).ok_or_else(|| {
            NotificationError::Persistence(format!(
                "queue row {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(QueuedEmail {
            id: row.id,
            template_key: row.template_key,
            recipient_email: row.recipient_email,
            recipient_name: row.recipient_name,
            variables: row.variables,
            scheduled_at: row.scheduled_at,
            priority: row.priority,
            status,
            claimed_at: row.claimed_at,
            user_id: row.user_id,
            booking_id: row.booking_id,
            category: row.category,
            metadata: row.metadata,
            created_at: row.created_at,
            processed_at: row.processed_at,
            error: row.error,
            cancelled_by: row.cancelled_by,
            cancel_reason: row.cancel_reason,
        })
    }
}

const COLUMNS: &str = "id, template_key, recipient_email, recipient_name, variables, \
     scheduled_at, priority, status, claimed_at, user_id, booking_id, category, metadata, \
     created_at, processed_at, error, cancelled_by, cancel_reason";

#[async_trait]
impl EmailQueueStore for PostgresQueueBackend {
    async fn enqueue(&self, email: NewQueuedEmail) -> Result<Uuid> {
        validate_new_email(&email)?;

        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO email_queue
                (id, template_key, recipient_email, recipient_name, variables,
                 scheduled_at, priority, status, user_id, booking_id, category, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, $10, $11, NOW())
            "#,
        )
        .bind(id)
        .bind(&email.template_key)
        .bind(&email.recipient_email)
        .bind(&email.recipient_name)
        .bind(&email.variables)
        .bind(email.scheduled_at)
        .bind(email.priority)
        .bind(email.user_id)
        .bind(email.booking_id)
        .bind(&email.category)
        .bind(&email.metadata)
        .execute(&self.pool)
        .await?;

        QueueMetrics::record_enqueued();

        tracing::debug!(
            queue_id = %id,
            template_key = %email.template_key,
            scheduled_at = %email.scheduled_at,
            "Email enqueued to PostgreSQL"
        );

        Ok(id)
    }

    async fn cancel(
        &self,
        id: Uuid,
        cancelled_by: Option<&str>,
        reason: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE email_queue
            SET status = 'cancelled', cancelled_by = $2, cancel_reason = $3, processed_at = NOW()
            WHERE id = $1 AND status = 'pending' AND claimed_at IS NULL
            "#,
        )
        .bind(id)
        .bind(cancelled_by)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        let cancelled = result.rows_affected() == 1;
        if cancelled {
            QueueMetrics::record_cancelled();
            tracing::debug!(queue_id = %id, "Queued email cancelled");
        }

        Ok(cancelled)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<QueuedEmail>> {
        // Single atomic claim: selection and marking happen in one statement,
        // and SKIP LOCKED keeps concurrent pollers off the same rows.
        let rows: Vec<QueuedEmailRow> = sqlx::query_as(&format!(
            r#"
            UPDATE email_queue
            SET claimed_at = NOW()
            WHERE id IN (
                SELECT id FROM email_queue
                WHERE status = 'pending' AND claimed_at IS NULL AND scheduled_at <= $1
                ORDER BY priority ASC, scheduled_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        // RETURNING does not preserve the subquery order
        let mut claimed = rows
            .into_iter()
            .map(QueuedEmail::try_from)
            .collect::<Result<Vec<_>>>()?;
        claimed.sort_by_key(|r| (r.priority, r.scheduled_at));

        if !claimed.is_empty() {
            QueueMetrics::record_claimed(claimed.len() as u64);
            tracing::debug!(claimed = claimed.len(), "Claimed due queue items");
        }

        Ok(claimed)
    }

    async fn mark_sent(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE email_queue SET status = 'sent', processed_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        QueueMetrics::record_sent();
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE email_queue SET status = 'failed', error = $2, processed_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        QueueMetrics::record_failed();
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<QueuedEmail>> {
        let row: Option<QueuedEmailRow> =
            sqlx::query_as(&format!("SELECT {} FROM email_queue WHERE id = $1", COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(QueuedEmail::try_from).transpose()
    }

    async fn stats(&self) -> Result<Vec<StatusCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM email_queue GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = Vec::with_capacity(rows.len());
        for (status, count) in rows {
            if let Some(status) = EmailStatus::parse(&status) {
                stats.push(StatusCount {
                    status,
                    count: count as u64,
                });
            } else {
                tracing::warn!(status = %status, "Skipping unknown status in queue stats");
            }
        }

        Ok(stats)
    }

    async fn items(
        &self,
        status: Option<EmailStatus>,
        page: usize,
        page_size: usize,
    ) -> Result<QueuePage> {
        let page = page.max(1);
        let offset = ((page - 1) * page_size) as i64;
        let status_str = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM email_queue WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status_str)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<QueuedEmailRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM email_queue
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            COLUMNS
        ))
        .bind(status_str)
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(QueuedEmail::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(QueuePage {
            items,
            total: total as u64,
        })
    }

    async fn reminder_exists(&self, booking_id: i64, kind: &str, offset: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM email_queue
                WHERE booking_id = $1
                  AND metadata->>'reminder_kind' = $2
                  AND (metadata->>'reminder_offset')::bigint = $3
            )
            "#,
        )
        .bind(booking_id)
        .bind(kind)
        .bind(offset)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_status_parsing() {
        let row = QueuedEmailRow {
            id: Uuid::new_v4(),
            template_key: "booking_created".to_string(),
            recipient_email: "a@example.com".to_string(),
            recipient_name: "A".to_string(),
            variables: serde_json::json!({}),
            scheduled_at: Utc::now(),
            priority: 5,
            status: "pending".to_string(),
            claimed_at: None,
            user_id: None,
            booking_id: None,
            category: None,
            metadata: None,
            created_at: Utc::now(),
            processed_at: None,
            error: None,
            cancelled_by: None,
            cancel_reason: None,
        };

        let email = QueuedEmail::try_from(row).unwrap();
        assert_eq!(email.status, EmailStatus::Pending);
    }

    #[test]
    fn test_row_unknown_status_is_error() {
        let row = QueuedEmailRow {
            id: Uuid::new_v4(),
            template_key: "t".to_string(),
            recipient_email: "a@example.com".to_string(),
            recipient_name: "A".to_string(),
            variables: serde_json::json!({}),
            scheduled_at: Utc::now(),
            priority: 5,
            status: "processing".to_string(),
            claimed_at: None,
            user_id: None,
            booking_id: None,
            category: None,
            metadata: None,
            created_at: Utc::now(),
            processed_at: None,
            error: None,
            cancelled_by: None,
            cancel_reason: None,
        };

        assert!(QueuedEmail::try_from(row).is_err());
    }
}
