//! Append-only delivery audit log.
//!
//! Every email send attempt produces exactly one entry reflecting its final
//! outcome. This core only writes; operators read through their own tooling.

mod memory_backend;
mod postgres_backend;

pub use memory_backend::MemoryDeliveryLog;
pub use postgres_backend::PostgresDeliveryLog;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::Result;

/// Final outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// One audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub id: Uuid,
    pub template_key: String,
    pub recipient: String,
    pub subject: Option<String>,
    pub status: DeliveryStatus,
    /// Which transport carried (or last attempted) the message
    pub provider: Option<String>,
    pub error: Option<String>,
    /// Rendered HTML body, kept on successful sends for audit
    pub html_body: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for appending an audit row.
#[derive(Debug, Clone)]
pub struct NewDeliveryLogEntry {
    pub template_key: String,
    pub recipient: String,
    pub subject: Option<String>,
    pub status: DeliveryStatus,
    pub provider: Option<String>,
    pub error: Option<String>,
    pub html_body: Option<String>,
}

impl NewDeliveryLogEntry {
    pub fn sent(
        template_key: impl Into<String>,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        provider: impl Into<String>,
        html_body: impl Into<String>,
    ) -> Self {
        Self {
            template_key: template_key.into(),
            recipient: recipient.into(),
            subject: Some(subject.into()),
            status: DeliveryStatus::Sent,
            provider: Some(provider.into()),
            error: None,
            html_body: Some(html_body.into()),
        }
    }

    pub fn failed(
        template_key: impl Into<String>,
        recipient: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            template_key: template_key.into(),
            recipient: recipient.into(),
            subject: None,
            status: DeliveryStatus::Failed,
            provider: None,
            error: Some(error.into()),
            html_body: None,
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// Write-only audit log boundary.
#[async_trait]
pub trait DeliveryLogStore: Send + Sync {
    async fn append(&self, entry: NewDeliveryLogEntry) -> Result<Uuid>;
}

/// Create a delivery log based on configuration.
pub fn create_delivery_log(
    settings: &StorageConfig,
    pool: Option<PgPool>,
) -> Arc<dyn DeliveryLogStore> {
    match (settings.backend.as_str(), pool) {
        ("postgres", Some(pool)) => {
            tracing::info!(backend = "postgres", "Creating PostgreSQL delivery log");
            Arc::new(PostgresDeliveryLog::new(pool))
        }
        ("postgres", None) => {
            tracing::warn!("Postgres delivery log requested but no pool available, using memory");
            Arc::new(MemoryDeliveryLog::new())
        }
        _ => {
            tracing::info!(backend = "memory", "Creating in-memory delivery log");
            Arc::new(MemoryDeliveryLog::new())
        }
    }
}
