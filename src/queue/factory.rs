//! Queue backend factory

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorageConfig;

use super::backend::EmailQueueStore;
use super::memory_backend::MemoryQueueBackend;
use super::postgres_backend::PostgresQueueBackend;

/// Create an email queue backend based on configuration.
///
/// - `"postgres"`: requires a PostgreSQL pool; falls back to memory with a
///   warning if none is provided
/// - `"memory"` (or anything else): in-memory backend
pub fn create_queue_store(
    settings: &StorageConfig,
    pool: Option<PgPool>,
) -> Arc<dyn EmailQueueStore> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = pool {
                tracing::info!(backend = "postgres", "Creating PostgreSQL email queue");
                Arc::new(PostgresQueueBackend::new(pool))
            } else {
                tracing::warn!(
                    "Postgres queue backend requested but no pool available, using memory"
                );
                Arc::new(MemoryQueueBackend::new())
            }
        }
        other => {
            if other != "memory" {
                tracing::warn!(backend = %other, "Unknown queue backend, using memory");
            }
            tracing::info!(backend = "memory", "Creating in-memory email queue");
            Arc::new(MemoryQueueBackend::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_from_config() {
        let settings = StorageConfig {
            backend: "memory".to_string(),
        };
        let store = create_queue_store(&settings, None);
        // The factory never fails; the trait object is usable directly
        let _ = store;
    }

    #[test]
    fn test_postgres_without_pool_falls_back() {
        let settings = StorageConfig {
            backend: "postgres".to_string(),
        };
        let _store = create_queue_store(&settings, None);
    }
}
