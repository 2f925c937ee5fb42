//! Deferred email queue data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a queued email. `Pending` is the only non-terminal state;
/// transitions are one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "pending",
            EmailStatus::Sent => "sent",
            EmailStatus::Failed => "failed",
            EmailStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EmailStatus::Pending),
            "sent" => Some(EmailStatus::Sent),
            "failed" => Some(EmailStatus::Failed),
            "cancelled" => Some(EmailStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, EmailStatus::Pending)
    }
}

impl std::fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata key carrying the reminder kind for idempotency lookups.
pub const META_REMINDER_KIND: &str = "reminder_kind";
/// Metadata key carrying the reminder offset in days.
pub const META_REMINDER_OFFSET: &str = "reminder_offset";

/// A deferred email awaiting (or past) delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedEmail {
    pub id: Uuid,
    pub template_key: String,
    pub recipient_email: String,
    pub recipient_name: String,
    /// Variable context for template rendering
    pub variables: serde_json::Value,
    pub scheduled_at: DateTime<Utc>,
    /// Lower value = more urgent
    pub priority: i32,
    pub status: EmailStatus,
    /// Set when a poller claims the row; a claimed row is invisible to other
    /// pollers and can no longer be cancelled
    pub claimed_at: Option<DateTime<Utc>>,
    pub user_id: Option<i64>,
    pub booking_id: Option<i64>,
    /// Sender-alias category ("bookings", "payments", "support")
    pub category: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    /// When the item reached a terminal state
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub cancelled_by: Option<String>,
    pub cancel_reason: Option<String>,
}

impl QueuedEmail {
    /// Reminder kind recorded in metadata, if this row was generated by the
    /// reminder scheduler.
    pub fn reminder_kind(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(META_REMINDER_KIND))
            .and_then(|v| v.as_str())
    }

    pub fn reminder_offset(&self) -> Option<i64> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(META_REMINDER_OFFSET))
            .and_then(|v| v.as_i64())
    }
}

/// Parameters for enqueueing a deferred email.
#[derive(Debug, Clone)]
pub struct NewQueuedEmail {
    pub template_key: String,
    pub recipient_email: String,
    pub recipient_name: String,
    pub variables: serde_json::Value,
    pub scheduled_at: DateTime<Utc>,
    pub priority: i32,
    pub user_id: Option<i64>,
    pub booking_id: Option<i64>,
    pub category: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewQueuedEmail {
    pub fn new(
        template_key: impl Into<String>,
        recipient_email: impl Into<String>,
        recipient_name: impl Into<String>,
        variables: serde_json::Value,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            template_key: template_key.into(),
            recipient_email: recipient_email.into(),
            recipient_name: recipient_name.into(),
            variables,
            scheduled_at,
            priority: 5,
            user_id: None,
            booking_id: None,
            category: None,
            metadata: None,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn booking_id(mut self, booking_id: i64) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Tag this email as a scheduler-generated reminder. The (booking, kind,
    /// offset) tuple is the idempotency key.
    pub fn reminder(mut self, booking_id: i64, kind: &str, offset: i64) -> Self {
        self.booking_id = Some(booking_id);
        let mut meta = match self.metadata.take() {
            Some(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        meta.insert(META_REMINDER_KIND.to_string(), serde_json::json!(kind));
        meta.insert(META_REMINDER_OFFSET.to_string(), serde_json::json!(offset));
        self.metadata = Some(serde_json::Value::Object(meta));
        self
    }

    /// Materialize into a pending row.
    pub fn into_queued(self) -> QueuedEmail {
        QueuedEmail {
            id: Uuid::new_v4(),
            template_key: self.template_key,
            recipient_email: self.recipient_email,
            recipient_name: self.recipient_name,
            variables: self.variables,
            scheduled_at: self.scheduled_at,
            priority: self.priority,
            status: EmailStatus::Pending,
            claimed_at: None,
            user_id: self.user_id,
            booking_id: self.booking_id,
            category: self.category,
            metadata: self.metadata,
            created_at: Utc::now(),
            processed_at: None,
            error: None,
            cancelled_by: None,
            cancel_reason: None,
        }
    }
}

/// One row of queue statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: EmailStatus,
    pub count: u64,
}

/// A page of queue items for operator inspection.
#[derive(Debug, Clone, Serialize)]
pub struct QueuePage {
    pub items: Vec<QueuedEmail>,
    pub total: u64,
}
