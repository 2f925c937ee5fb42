//! Queue draining worker.
//!
//! On a short interval, atomically claims a bounded batch of due queue items
//! and drives each through the email adapter. Per-item failures are isolated
//! and there is no automatic re-queue: a failed item stays `failed` for
//! operator inspection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::broadcast;

use crate::channels::EmailChannel;
use crate::config::{QueueWorkerConfig, ServiceConfig};
use crate::queue::{EmailQueueStore, QueuedEmail};

/// Background task draining the deferred email queue.
pub struct QueueWorkerTask {
    config: QueueWorkerConfig,
    service: ServiceConfig,
    queue: Arc<dyn EmailQueueStore>,
    email: Arc<EmailChannel>,
    shutdown: broadcast::Receiver<()>,
}

impl QueueWorkerTask {
    pub fn new(
        config: QueueWorkerConfig,
        service: ServiceConfig,
        queue: Arc<dyn EmailQueueStore>,
        email: Arc<EmailChannel>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            service,
            queue,
            email,
            shutdown,
        }
    }

    /// Run the polling loop until shutdown.
    pub async fn run(mut self) {
        let mut timer =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_seconds));

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            poll_interval_secs = self.config.poll_interval_seconds,
            batch_size = self.config.batch_size,
            "Queue worker started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Queue worker received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.drain_once().await;
                }
            }
        }

        tracing::info!("Queue worker stopped");
    }

    /// Claim and process one batch of due items. Returns the number of items
    /// processed.
    pub async fn drain_once(&self) -> usize {
        let claimed = match self.queue.claim_due(Utc::now(), self.config.batch_size).await {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to claim due queue items");
                return 0;
            }
        };

        if claimed.is_empty() {
            return 0;
        }

        let start = Instant::now();
        let batch_size = claimed.len();
        let mut sent = 0;
        let mut failed = 0;

        for item in claimed {
            if self.process_item(&item).await {
                sent += 1;
            } else {
                failed += 1;
            }
        }

        tracing::info!(
            batch = batch_size,
            sent = sent,
            failed = failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Queue batch processed"
        );

        batch_size
    }

    /// Drive one claimed item to its terminal state. Returns whether the
    /// send succeeded. Store failures on the terminal transition are logged,
    /// not propagated, so one item can never abort the batch.
    async fn process_item(&self, item: &QueuedEmail) -> bool {
        let context = self.build_context(item);

        let result = self
            .email
            .send(
                &item.template_key,
                &item.recipient_email,
                &item.recipient_name,
                item.category.as_deref(),
                &context,
            )
            .await;

        if result.success {
            if let Err(e) = self.queue.mark_sent(item.id).await {
                tracing::error!(queue_id = %item.id, error = %e, "Failed to mark queue item sent");
            }
            true
        } else {
            let error = result.error.unwrap_or_else(|| "send failed".to_string());
            if let Err(e) = self.queue.mark_failed(item.id, &error).await {
                tracing::error!(queue_id = %item.id, error = %e, "Failed to mark queue item failed");
            }
            false
        }
    }

    /// Item variables supplemented with the platform constants every stock
    /// template references.
    fn build_context(&self, item: &QueuedEmail) -> serde_json::Map<String, serde_json::Value> {
        let mut context = serde_json::Map::new();
        context.insert(
            "product_name".to_string(),
            serde_json::json!(self.service.product_name),
        );
        context.insert("base_url".to_string(), serde_json::json!(self.service.base_url));
        context.insert(
            "current_year".to_string(),
            serde_json::json!(Utc::now().format("%Y").to_string()),
        );

        if let serde_json::Value::Object(map) = &item.variables {
            for (key, value) in map {
                context.insert(key.clone(), value.clone());
            }
        }

        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryDeliveryLog;
    use crate::channels::email::MockEmailProvider;
    use crate::config::EmailConfig;
    use crate::queue::{EmailStatus, MemoryQueueBackend, NewQueuedEmail};
    use crate::template::MemoryTemplateStore;
    use serde_json::json;

    fn worker(
        queue: Arc<dyn EmailQueueStore>,
        primary: MockEmailProvider,
    ) -> (QueueWorkerTask, broadcast::Sender<()>) {
        let email_config = EmailConfig {
            api_url: "https://api.example.com".to_string(),
            api_key: "k".to_string(),
            from_name: "Fete".to_string(),
            senders: Default::default(),
            timeout_seconds: 2,
            smtp: Default::default(),
        };
        let email = Arc::new(EmailChannel::new(
            Arc::new(MemoryTemplateStore::seeded()),
            Arc::new(primary),
            Arc::new(MockEmailProvider::failing("fallback down")),
            Arc::new(MemoryDeliveryLog::new()),
            &email_config,
        ));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = QueueWorkerTask::new(
            QueueWorkerConfig {
                poll_interval_seconds: 1,
                batch_size: 2,
            },
            ServiceConfig::default(),
            queue,
            email,
            shutdown_rx,
        );
        (task, shutdown_tx)
    }

    #[tokio::test]
    async fn test_drain_respects_batch_and_priority() {
        let queue: Arc<dyn EmailQueueStore> = Arc::new(MemoryQueueBackend::new());
        let now = Utc::now();

        for priority in [1, 5, 3] {
            let mut email = NewQueuedEmail::new(
                "booking_reminder",
                "a@example.com",
                "A",
                json!({"display_name": "A"}),
                now - chrono::Duration::minutes(1),
            );
            email.priority = priority;
            queue.enqueue(email).await.unwrap();
        }

        let (task, _shutdown) = worker(queue.clone(), MockEmailProvider::new());

        // Batch size 2: priorities 1 and 3 are processed, 5 stays pending
        let processed = task.drain_once().await;
        assert_eq!(processed, 2);

        let stats = queue.stats().await.unwrap();
        let sent = stats.iter().find(|s| s.status == EmailStatus::Sent).unwrap();
        let pending = stats.iter().find(|s| s.status == EmailStatus::Pending).unwrap();
        assert_eq!(sent.count, 2);
        assert_eq!(pending.count, 1);
    }

    #[tokio::test]
    async fn test_failed_item_is_terminal_not_requeued() {
        let queue: Arc<dyn EmailQueueStore> = Arc::new(MemoryQueueBackend::new());
        let id = queue
            .enqueue(NewQueuedEmail::new(
                "booking_reminder",
                "a@example.com",
                "A",
                json!({}),
                Utc::now() - chrono::Duration::minutes(1),
            ))
            .await
            .unwrap();

        let (task, _shutdown) = worker(queue.clone(), MockEmailProvider::failing("primary down"));
        task.drain_once().await;

        let row = queue.get(id).await.unwrap().unwrap();
        assert_eq!(row.status, EmailStatus::Failed);
        assert!(row.error.is_some());

        // A later poll finds nothing to claim
        assert_eq!(task.drain_once().await, 0);
    }

    #[tokio::test]
    async fn test_run_loop_shutdown() {
        let queue: Arc<dyn EmailQueueStore> = Arc::new(MemoryQueueBackend::new());
        let (task, shutdown_tx) = worker(queue, MockEmailProvider::new());

        let handle = tokio::spawn(async move {
            task.run().await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("Task should complete")
            .expect("Task should not panic");
    }
}
