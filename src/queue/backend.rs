//! Backend trait for the deferred email queue.
//!
//! This module defines the abstraction layer for queue storage, allowing
//! different implementations (memory, PostgreSQL) to be used interchangeably.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;

use super::models::{EmailStatus, NewQueuedEmail, QueuePage, QueuedEmail, StatusCount};

/// Storage backend for the deferred email queue.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the worker task and API callers
/// share one instance.
///
/// # Claim semantics
///
/// `claim_due` must be atomic: under concurrent pollers, no row is ever
/// returned by more than one claim. A claimed row keeps status `pending`
/// until its terminal transition but is invisible to further claims and can
/// no longer be cancelled.
#[async_trait]
pub trait EmailQueueStore: Send + Sync {
    /// Enqueue a deferred email, returning the queue id.
    ///
    /// # Errors
    ///
    /// `Configuration` if the template key or recipient is empty;
    /// `Persistence` on store failure.
    async fn enqueue(&self, email: NewQueuedEmail) -> Result<Uuid>;

    /// Cancel a queued email.
    ///
    /// Returns `true` only if the row was still `pending` and unclaimed; a
    /// claimed or terminal row is left untouched and `false` is returned.
    async fn cancel(
        &self,
        id: Uuid,
        cancelled_by: Option<&str>,
        reason: Option<&str>,
    ) -> Result<bool>;

    /// Atomically claim up to `limit` due rows (`scheduled_at <= now`,
    /// status `pending`, unclaimed), ordered by priority then scheduled
    /// time.
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<QueuedEmail>>;

    /// Transition a claimed row to `sent`.
    async fn mark_sent(&self, id: Uuid) -> Result<()>;

    /// Transition a claimed row to `failed`, recording the error detail.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()>;

    /// Fetch one row by id.
    async fn get(&self, id: Uuid) -> Result<Option<QueuedEmail>>;

    /// Per-status row counts.
    async fn stats(&self) -> Result<Vec<StatusCount>>;

    /// Page through queue items, newest first, optionally filtered by
    /// status. `page` is 1-based.
    async fn items(
        &self,
        status: Option<EmailStatus>,
        page: usize,
        page_size: usize,
    ) -> Result<QueuePage>;

    /// Whether a reminder for (booking, kind, offset) was ever enqueued,
    /// regardless of its current status. The scheduler consults this before
    /// every enqueue.
    async fn reminder_exists(&self, booking_id: i64, kind: &str, offset: i64) -> Result<bool>;
}

/// Validate enqueue parameters shared by all backends.
pub(super) fn validate_new_email(email: &NewQueuedEmail) -> Result<()> {
    if email.template_key.trim().is_empty() {
        return Err(crate::error::NotificationError::Configuration(
            "queued email requires a template key".to_string(),
        ));
    }
    if email.recipient_email.trim().is_empty() {
        return Err(crate::error::NotificationError::Configuration(
            "queued email requires a recipient".to_string(),
        ));
    }
    Ok(())
}
