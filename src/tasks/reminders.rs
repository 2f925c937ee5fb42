//! Reminder generation scheduler.
//!
//! On a daily cadence, scans the booking read model and enqueues reminder
//! and review-request emails. Every candidate is checked against the queue's
//! (booking, kind, offset) idempotency lookup before enqueueing, so running
//! the scan twice on the same day never produces duplicates.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::broadcast;

use crate::config::ReminderConfig;
use crate::directory::{BookingParty, BookingReadModel, BookingSnapshot, PartyRole};
use crate::error::Result;
use crate::metrics::ReminderMetrics;
use crate::queue::{EmailQueueStore, NewQueuedEmail};

/// Priorities per reminder kind; lower is more urgent.
const PRIORITY_EVENT_REMINDER: i32 = 3;
const PRIORITY_ACTION_REMINDER: i32 = 4;
const PRIORITY_REVIEW_REQUEST: i32 = 6;

/// Counts from one scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanSummary {
    pub generated: usize,
    pub deduped: usize,
}

/// Background task generating reminder emails from booking state.
pub struct ReminderTask {
    config: ReminderConfig,
    queue: Arc<dyn EmailQueueStore>,
    bookings: Arc<dyn BookingReadModel>,
    shutdown: broadcast::Receiver<()>,
}

impl ReminderTask {
    pub fn new(
        config: ReminderConfig,
        queue: Arc<dyn EmailQueueStore>,
        bookings: Arc<dyn BookingReadModel>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            queue,
            bookings,
            shutdown,
        }
    }

    /// Run the scan loop until shutdown.
    pub async fn run(mut self) {
        if !self.config.enabled {
            tracing::info!("Reminder scheduler disabled");
            return;
        }

        // Small startup jitter so multiple instances don't scan in lockstep
        let jitter = rand::rng().random_range(0..60);
        tokio::time::sleep(Duration::from_secs(jitter)).await;

        let mut timer =
            tokio::time::interval(Duration::from_secs(self.config.scan_interval_seconds));

        tracing::info!(
            scan_interval_secs = self.config.scan_interval_seconds,
            offsets = ?self.config.event_offsets_days,
            "Reminder scheduler started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Reminder scheduler received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    let summary = self.scan_once().await;
                    tracing::info!(
                        generated = summary.generated,
                        deduped = summary.deduped,
                        "Reminder scan completed"
                    );
                }
            }
        }

        tracing::info!("Reminder scheduler stopped");
    }

    /// One full scan: event reminders per offset, pending-action reminders,
    /// and review requests for yesterday's completed bookings. Each step is
    /// isolated; a read-model failure skips that step only.
    pub async fn scan_once(&self) -> ScanSummary {
        let mut summary = ScanSummary::default();
        let today = Utc::now().date_naive();

        // Upcoming event reminders, one per party per booking per offset
        for &offset in &self.config.event_offsets_days {
            let target = today + chrono::Duration::days(offset);
            match self.bookings.confirmed_on(target).await {
                Ok(bookings) => {
                    for booking in &bookings {
                        for party in booking.parties() {
                            self.enqueue_event_reminder(booking, party, offset, &mut summary)
                                .await;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(offset_days = offset, error = %e, "Event reminder scan failed");
                }
            }
        }

        // Vendors sitting on a booking request
        let cutoff = Utc::now() - chrono::Duration::days(self.config.pending_action_age_days);
        match self.bookings.pending_vendor_approval(cutoff).await {
            Ok(bookings) => {
                for booking in &bookings {
                    self.enqueue_action_reminder(
                        booking,
                        &booking.vendor,
                        "approval_reminder",
                        "vendor_approval_reminder",
                        &mut summary,
                    )
                    .await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Vendor approval reminder scan failed");
            }
        }

        // Clients who accepted but have not paid
        match self.bookings.pending_client_payment(cutoff).await {
            Ok(bookings) => {
                for booking in &bookings {
                    self.enqueue_action_reminder(
                        booking,
                        &booking.client,
                        "payment_reminder",
                        "payment_reminder",
                        &mut summary,
                    )
                    .await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Payment reminder scan failed");
            }
        }

        // Review requests the day after a paid event
        let yesterday = today - chrono::Duration::days(1);
        match self.bookings.completed_on(yesterday).await {
            Ok(bookings) => {
                for booking in &bookings {
                    self.enqueue_review_request(booking, &mut summary).await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Review request scan failed");
            }
        }

        summary
    }

    async fn enqueue_event_reminder(
        &self,
        booking: &BookingSnapshot,
        party: &BookingParty,
        offset: i64,
        summary: &mut ScanSummary,
    ) {
        let kind = match party.role {
            PartyRole::Client => "event_reminder_client",
            PartyRole::Vendor => "event_reminder_vendor",
        };

        let email = NewQueuedEmail::new(
            "booking_reminder",
            &party.email,
            &party.name,
            serde_json::json!({
                "display_name": party.name,
                "service_name": booking.service_name,
                "event_date": booking.event_date.to_string(),
                "booking_id": booking.id,
            }),
            Utc::now(),
        )
        .priority(PRIORITY_EVENT_REMINDER)
        .user_id(party.user_id)
        .category("bookings")
        .reminder(booking.id, kind, offset);

        self.enqueue_checked(booking.id, kind, offset, email, summary)
            .await;
    }

    async fn enqueue_action_reminder(
        &self,
        booking: &BookingSnapshot,
        party: &BookingParty,
        template_key: &str,
        kind: &str,
        summary: &mut ScanSummary,
    ) {
        let email = NewQueuedEmail::new(
            template_key,
            &party.email,
            &party.name,
            serde_json::json!({
                "display_name": party.name,
                "client_name": booking.client.name,
                "vendor_name": booking.vendor.name,
                "service_name": booking.service_name,
                "event_date": booking.event_date.to_string(),
                "booking_id": booking.id,
            }),
            Utc::now(),
        )
        .priority(PRIORITY_ACTION_REMINDER)
        .user_id(party.user_id)
        .category(if kind == "payment_reminder" {
            "payments"
        } else {
            "bookings"
        })
        .reminder(booking.id, kind, 0);

        self.enqueue_checked(booking.id, kind, 0, email, summary).await;
    }

    async fn enqueue_review_request(&self, booking: &BookingSnapshot, summary: &mut ScanSummary) {
        let kind = "review_request";
        let email = NewQueuedEmail::new(
            "review_request",
            &booking.client.email,
            &booking.client.name,
            serde_json::json!({
                "display_name": booking.client.name,
                "vendor_name": booking.vendor.name,
                "service_name": booking.service_name,
                "event_date": booking.event_date.to_string(),
                "booking_id": booking.id,
            }),
            Utc::now(),
        )
        .priority(PRIORITY_REVIEW_REQUEST)
        .user_id(booking.client.user_id)
        .category("bookings")
        .reminder(booking.id, kind, 0);

        self.enqueue_checked(booking.id, kind, 0, email, summary).await;
    }

    /// The idempotency gate: enqueue only if no equivalent reminder was ever
    /// queued. A lookup failure skips the candidate (it will be retried on
    /// the next scan) rather than risking a duplicate.
    async fn enqueue_checked(
        &self,
        booking_id: i64,
        kind: &str,
        offset: i64,
        email: NewQueuedEmail,
        summary: &mut ScanSummary,
    ) {
        match self.exists(booking_id, kind, offset).await {
            Ok(true) => {
                ReminderMetrics::record_deduped();
                summary.deduped += 1;
            }
            Ok(false) => match self.queue.enqueue(email).await {
                Ok(queue_id) => {
                    ReminderMetrics::record_generated(kind);
                    summary.generated += 1;
                    tracing::debug!(
                        booking_id = booking_id,
                        kind = %kind,
                        offset_days = offset,
                        queue_id = %queue_id,
                        "Reminder enqueued"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        booking_id = booking_id,
                        kind = %kind,
                        error = %e,
                        "Failed to enqueue reminder"
                    );
                }
            },
            Err(e) => {
                tracing::warn!(
                    booking_id = booking_id,
                    kind = %kind,
                    error = %e,
                    "Reminder idempotency check failed, skipping candidate"
                );
            }
        }
    }

    async fn exists(&self, booking_id: i64, kind: &str, offset: i64) -> Result<bool> {
        self.queue.reminder_exists(booking_id, kind, offset).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryBookingReadModel;
    use crate::queue::{EmailStatus, MemoryQueueBackend};
    use chrono::{NaiveDate, Utc};

    fn booking(id: i64, event_date: NaiveDate) -> BookingSnapshot {
        BookingSnapshot {
            id,
            service_name: "DJ set".to_string(),
            event_date,
            client: BookingParty {
                user_id: 1,
                email: "client@example.com".to_string(),
                name: "Client".to_string(),
                role: PartyRole::Client,
            },
            vendor: BookingParty {
                user_id: 2,
                email: "vendor@example.com".to_string(),
                name: "Vendor".to_string(),
                role: PartyRole::Vendor,
            },
            awaiting_vendor_approval: false,
            awaiting_client_payment: false,
            payment_completed: false,
            created_at: Utc::now(),
        }
    }

    fn task(
        queue: Arc<dyn EmailQueueStore>,
        bookings: Arc<MemoryBookingReadModel>,
    ) -> ReminderTask {
        let (_, shutdown_rx) = broadcast::channel(1);
        ReminderTask::new(
            ReminderConfig::default(),
            queue,
            bookings,
            shutdown_rx,
        )
    }

    #[tokio::test]
    async fn test_event_reminders_per_party_per_offset() {
        let queue: Arc<dyn EmailQueueStore> = Arc::new(MemoryQueueBackend::new());
        let bookings = Arc::new(MemoryBookingReadModel::new());

        // One booking exactly three days out
        let today = Utc::now().date_naive();
        bookings.insert(booking(1, today + chrono::Duration::days(3)));

        let task = task(queue.clone(), bookings);
        let summary = task.scan_once().await;

        // One reminder for the client and one for the vendor
        assert_eq!(summary.generated, 2);

        let page = queue.items(Some(EmailStatus::Pending), 1, 10).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|i| i.template_key == "booking_reminder"));
    }

    #[tokio::test]
    async fn test_scan_is_idempotent() {
        let queue: Arc<dyn EmailQueueStore> = Arc::new(MemoryQueueBackend::new());
        let bookings = Arc::new(MemoryBookingReadModel::new());

        let today = Utc::now().date_naive();
        bookings.insert(booking(1, today + chrono::Duration::days(1)));

        let task = task(queue.clone(), bookings);
        let first = task.scan_once().await;
        let second = task.scan_once().await;

        assert_eq!(first.generated, 2);
        assert_eq!(second.generated, 0);
        assert_eq!(second.deduped, 2);

        let page = queue.items(None, 1, 50).await.unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_pending_action_reminders() {
        let queue: Arc<dyn EmailQueueStore> = Arc::new(MemoryQueueBackend::new());
        let bookings = Arc::new(MemoryBookingReadModel::new());

        let today = Utc::now().date_naive();

        let mut stale_approval = booking(1, today + chrono::Duration::days(30));
        stale_approval.awaiting_vendor_approval = true;
        stale_approval.created_at = Utc::now() - chrono::Duration::days(5);
        bookings.insert(stale_approval);

        let mut unpaid = booking(2, today + chrono::Duration::days(30));
        unpaid.awaiting_client_payment = true;
        unpaid.created_at = Utc::now() - chrono::Duration::days(5);
        bookings.insert(unpaid);

        let task = task(queue.clone(), bookings);
        let summary = task.scan_once().await;
        assert_eq!(summary.generated, 2);

        let page = queue.items(None, 1, 10).await.unwrap();
        let templates: Vec<_> = page.items.iter().map(|i| i.template_key.as_str()).collect();
        assert!(templates.contains(&"approval_reminder"));
        assert!(templates.contains(&"payment_reminder"));

        // The approval nag goes to the vendor, the payment nag to the client
        let approval = page.items.iter().find(|i| i.template_key == "approval_reminder").unwrap();
        assert_eq!(approval.recipient_email, "vendor@example.com");
        let payment = page.items.iter().find(|i| i.template_key == "payment_reminder").unwrap();
        assert_eq!(payment.recipient_email, "client@example.com");
    }

    #[tokio::test]
    async fn test_review_request_for_yesterdays_paid_booking() {
        let queue: Arc<dyn EmailQueueStore> = Arc::new(MemoryQueueBackend::new());
        let bookings = Arc::new(MemoryBookingReadModel::new());

        let yesterday = Utc::now().date_naive() - chrono::Duration::days(1);

        let mut paid = booking(1, yesterday);
        paid.payment_completed = true;
        bookings.insert(paid);

        // Unpaid booking from yesterday gets no review request
        bookings.insert(booking(2, yesterday));

        let task = task(queue.clone(), bookings);
        let summary = task.scan_once().await;

        assert_eq!(summary.generated, 1);
        let page = queue.items(None, 1, 10).await.unwrap();
        assert_eq!(page.items[0].template_key, "review_request");
        assert_eq!(page.items[0].recipient_email, "client@example.com");
        assert_eq!(page.items[0].booking_id, Some(1));
    }
}
