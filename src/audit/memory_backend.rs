//! In-memory delivery log.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{NotificationError, Result};

use super::{DeliveryLogEntry, DeliveryLogStore, NewDeliveryLogEntry};

/// In-memory append-only delivery log.
pub struct MemoryDeliveryLog {
    entries: Mutex<Vec<DeliveryLogEntry>>,
}

impl MemoryDeliveryLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of all entries, in append order. Test/dev helper.
    pub fn entries(&self) -> Vec<DeliveryLogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

impl Default for MemoryDeliveryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryLogStore for MemoryDeliveryLog {
    async fn append(&self, entry: NewDeliveryLogEntry) -> Result<Uuid> {
        let row = DeliveryLogEntry {
            id: Uuid::new_v4(),
            template_key: entry.template_key,
            recipient: entry.recipient,
            subject: entry.subject,
            status: entry.status,
            provider: entry.provider,
            error: entry.error,
            html_body: entry.html_body,
            created_at: Utc::now(),
        };
        let id = row.id;

        self.entries
            .lock()
            .map_err(|_| NotificationError::Persistence("delivery log lock poisoned".to_string()))?
            .push(row);

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::DeliveryStatus;

    #[tokio::test]
    async fn test_append_order_preserved() {
        let log = MemoryDeliveryLog::new();

        log.append(NewDeliveryLogEntry::sent(
            "booking_created",
            "a@example.com",
            "Subject",
            "http",
            "<p>hi</p>",
        ))
        .await
        .unwrap();
        log.append(NewDeliveryLogEntry::failed(
            "booking_created",
            "b@example.com",
            "provider down",
        ))
        .await
        .unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, DeliveryStatus::Sent);
        assert_eq!(entries[0].html_body.as_deref(), Some("<p>hi</p>"));
        assert_eq!(entries[1].status, DeliveryStatus::Failed);
        assert_eq!(entries[1].error.as_deref(), Some("provider down"));
    }
}
