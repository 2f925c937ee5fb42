//! In-app notification storage.
//!
//! The in-app channel is pure persistence: a rendered record is written for
//! the product surface to display. Read/unread tracking belongs to that
//! surface and is never written from here.

mod memory_backend;
mod postgres_backend;

pub use memory_backend::MemoryInAppStore;
pub use postgres_backend::PostgresInAppStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::Result;

/// A persisted in-app notification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InAppNotification {
    pub id: Uuid,
    pub user_id: i64,
    pub type_key: String,
    pub title: String,
    pub message: String,
    pub related_id: Option<i64>,
    pub related_type: Option<String>,
    pub action_url: Option<String>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Written by the consuming surface, never by this service
    pub read_at: Option<DateTime<Utc>>,
}

/// Parameters for persisting an in-app notification.
#[derive(Debug, Clone)]
pub struct NewInAppNotification {
    pub user_id: i64,
    pub type_key: String,
    pub title: String,
    pub message: String,
    pub related_id: Option<i64>,
    pub related_type: Option<String>,
    pub action_url: Option<String>,
    pub icon: Option<String>,
}

/// Storage backend for in-app notifications.
#[async_trait]
pub trait InAppNotificationStore: Send + Sync {
    /// Persist a rendered record, returning its id.
    async fn insert(&self, notification: NewInAppNotification) -> Result<Uuid>;
}

/// Create an in-app store based on configuration.
pub fn create_inapp_store(
    settings: &StorageConfig,
    pool: Option<PgPool>,
) -> Arc<dyn InAppNotificationStore> {
    match (settings.backend.as_str(), pool) {
        ("postgres", Some(pool)) => {
            tracing::info!(backend = "postgres", "Creating PostgreSQL in-app store");
            Arc::new(PostgresInAppStore::new(pool))
        }
        ("postgres", None) => {
            tracing::warn!("Postgres in-app store requested but no pool available, using memory");
            Arc::new(MemoryInAppStore::new())
        }
        _ => {
            tracing::info!(backend = "memory", "Creating in-memory in-app store");
            Arc::new(MemoryInAppStore::new())
        }
    }
}
