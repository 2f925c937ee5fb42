//! In-memory email queue backend.
//!
//! Backs development and tests. All operations take one lock over the row
//! map, which makes the claim naturally atomic: a row selected by one
//! `claim_due` pass is marked claimed before the lock is released.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{NotificationError, Result};
use crate::metrics::QueueMetrics;

use super::backend::{validate_new_email, EmailQueueStore};
use super::models::{EmailStatus, NewQueuedEmail, QueuePage, QueuedEmail, StatusCount};

/// In-memory email queue backend.
pub struct MemoryQueueBackend {
    rows: Mutex<HashMap<Uuid, QueuedEmail>>,
}

impl MemoryQueueBackend {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, QueuedEmail>>> {
        self.rows
            .lock()
            .map_err(|_| NotificationError::Persistence("queue lock poisoned".to_string()))
    }
}

impl Default for MemoryQueueBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailQueueStore for MemoryQueueBackend {
    async fn enqueue(&self, email: NewQueuedEmail) -> Result<Uuid> {
        validate_new_email(&email)?;

        let row = email.into_queued();
        let id = row.id;

        self.lock()?.insert(id, row);
        QueueMetrics::record_enqueued();

        tracing::debug!(queue_id = %id, "Email enqueued");
        Ok(id)
    }

    async fn cancel(
        &self,
        id: Uuid,
        cancelled_by: Option<&str>,
        reason: Option<&str>,
    ) -> Result<bool> {
        let mut rows = self.lock()?;

        let Some(row) = rows.get_mut(&id) else {
            return Ok(false);
        };

        if row.status != EmailStatus::Pending || row.claimed_at.is_some() {
            return Ok(false);
        }

        row.status = EmailStatus::Cancelled;
        row.processed_at = Some(Utc::now());
        row.cancelled_by = cancelled_by.map(|s| s.to_string());
        row.cancel_reason = reason.map(|s| s.to_string());

        QueueMetrics::record_cancelled();
        tracing::debug!(queue_id = %id, "Queued email cancelled");
        Ok(true)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<QueuedEmail>> {
        let mut rows = self.lock()?;

        let mut due: Vec<Uuid> = rows
            .values()
            .filter(|r| {
                r.status == EmailStatus::Pending && r.claimed_at.is_none() && r.scheduled_at <= now
            })
            .map(|r| r.id)
            .collect();

        due.sort_by_key(|id| {
            let r = &rows[id];
            (r.priority, r.scheduled_at)
        });
        due.truncate(limit);

        let mut claimed = Vec::with_capacity(due.len());
        for id in due {
            if let Some(row) = rows.get_mut(&id) {
                row.claimed_at = Some(now);
                claimed.push(row.clone());
            }
        }

        if !claimed.is_empty() {
            QueueMetrics::record_claimed(claimed.len() as u64);
        }

        Ok(claimed)
    }

    async fn mark_sent(&self, id: Uuid) -> Result<()> {
        let mut rows = self.lock()?;
        if let Some(row) = rows.get_mut(&id) {
            if row.status == EmailStatus::Pending {
                row.status = EmailStatus::Sent;
                row.processed_at = Some(Utc::now());
                QueueMetrics::record_sent();
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        let mut rows = self.lock()?;
        if let Some(row) = rows.get_mut(&id) {
            if row.status == EmailStatus::Pending {
                row.status = EmailStatus::Failed;
                row.error = Some(error.to_string());
                row.processed_at = Some(Utc::now());
                QueueMetrics::record_failed();
            }
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<QueuedEmail>> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn stats(&self) -> Result<Vec<StatusCount>> {
        let rows = self.lock()?;
        let mut counts: HashMap<EmailStatus, u64> = HashMap::new();
        for row in rows.values() {
            *counts.entry(row.status).or_default() += 1;
        }

        let mut stats: Vec<StatusCount> = counts
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect();
        stats.sort_by_key(|s| s.status.as_str());
        Ok(stats)
    }

    async fn items(
        &self,
        status: Option<EmailStatus>,
        page: usize,
        page_size: usize,
    ) -> Result<QueuePage> {
        let rows = self.lock()?;

        let mut matching: Vec<QueuedEmail> = rows
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let page = page.max(1);
        let start = (page - 1).saturating_mul(page_size);
        let items = matching.into_iter().skip(start).take(page_size).collect();

        Ok(QueuePage { items, total })
    }

    async fn reminder_exists(&self, booking_id: i64, kind: &str, offset: i64) -> Result<bool> {
        let rows = self.lock()?;
        Ok(rows.values().any(|r| {
            r.booking_id == Some(booking_id)
                && r.reminder_kind() == Some(kind)
                && r.reminder_offset() == Some(offset)
        }))
    }
}
