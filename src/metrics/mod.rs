//! Prometheus metrics for the notification service.
//!
//! This module provides metrics for monitoring delivery across channels:
//! - Email metrics (sent, failed, fallback usage)
//! - Push metrics (sent, failed, deactivated subscriptions)
//! - In-app metrics (records created)
//! - Queue metrics (enqueued, claimed, cancelled)
//! - Reminder generation metrics

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "fete_notify";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Total orchestrated sends by type key
    pub static ref DISPATCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_total", METRIC_PREFIX),
        "Total orchestrated notification sends",
        &["type_key"]
    ).unwrap();

    /// Per-channel results of orchestrated sends
    pub static ref CHANNEL_RESULTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_channel_results_total", METRIC_PREFIX),
        "Channel adapter outcomes",
        &["channel", "result"]
    ).unwrap();

    // ============================================================================
    // Email Metrics
    // ============================================================================

    /// Emails delivered, labelled by the transport that carried them
    pub static ref EMAILS_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_emails_sent_total", METRIC_PREFIX),
        "Emails delivered by transport",
        &["provider"]
    ).unwrap();

    /// Emails where both the primary and fallback transport failed
    pub static ref EMAILS_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_emails_failed_total", METRIC_PREFIX),
        "Emails that failed on both transports"
    ).unwrap();

    /// Primary transport failures that fell back to SMTP
    pub static ref EMAIL_FALLBACK_TOTAL: IntCounter = register_int_counter!(
        format!("{}_email_fallback_total", METRIC_PREFIX),
        "Email sends that fell back to the SMTP transport"
    ).unwrap();

    // ============================================================================
    // Push Metrics
    // ============================================================================

    /// Push messages delivered per subscription
    pub static ref PUSH_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_sent_total", METRIC_PREFIX),
        "Push deliveries accepted by the provider"
    ).unwrap();

    /// Push deliveries dropped after a failure
    pub static ref PUSH_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_failed_total", METRIC_PREFIX),
        "Push deliveries that failed and were dropped"
    ).unwrap();

    /// Subscriptions deactivated after a permanent provider response
    pub static ref PUSH_DEACTIVATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_deactivated_total", METRIC_PREFIX),
        "Push subscriptions deactivated as permanently gone"
    ).unwrap();

    // ============================================================================
    // In-App Metrics
    // ============================================================================

    /// In-app notification records created
    pub static ref INAPP_CREATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_inapp_created_total", METRIC_PREFIX),
        "In-app notification records persisted"
    ).unwrap();

    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Emails enqueued for deferred delivery
    pub static ref QUEUE_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_enqueued_total", METRIC_PREFIX),
        "Emails enqueued for deferred delivery"
    ).unwrap();

    /// Queue items claimed by the worker
    pub static ref QUEUE_CLAIMED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_claimed_total", METRIC_PREFIX),
        "Queue items claimed for processing"
    ).unwrap();

    /// Queue items cancelled while still pending
    pub static ref QUEUE_CANCELLED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_cancelled_total", METRIC_PREFIX),
        "Queue items cancelled before processing"
    ).unwrap();

    /// Terminal queue transitions by outcome
    pub static ref QUEUE_PROCESSED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_queue_processed_total", METRIC_PREFIX),
        "Queue items driven to a terminal state",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // Reminder Metrics
    // ============================================================================

    /// Reminder emails generated by the scheduler, by kind
    pub static ref REMINDERS_GENERATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_reminders_generated_total", METRIC_PREFIX),
        "Reminder emails enqueued by the scheduler",
        &["kind"]
    ).unwrap();

    /// Reminder candidates skipped by the idempotency check
    pub static ref REMINDERS_DEDUPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_reminders_deduped_total", METRIC_PREFIX),
        "Reminder candidates skipped because an equivalent was already queued"
    ).unwrap();
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording email metrics
pub struct EmailMetrics;

impl EmailMetrics {
    /// Record a delivery through the primary HTTP provider
    pub fn record_sent_primary() {
        EMAILS_SENT_TOTAL.with_label_values(&["http"]).inc();
    }

    /// Record a delivery through the SMTP fallback
    pub fn record_sent_fallback() {
        EMAILS_SENT_TOTAL.with_label_values(&["smtp"]).inc();
        EMAIL_FALLBACK_TOTAL.inc();
    }

    /// Record a send where both transports failed
    pub fn record_failed() {
        EMAILS_FAILED_TOTAL.inc();
    }
}

/// Helper struct for recording push metrics
pub struct PushMetrics;

impl PushMetrics {
    pub fn record_sent(count: u64) {
        PUSH_SENT_TOTAL.inc_by(count);
    }

    pub fn record_failed(count: u64) {
        PUSH_FAILED_TOTAL.inc_by(count);
    }

    pub fn record_deactivated() {
        PUSH_DEACTIVATED_TOTAL.inc();
    }
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    pub fn record_send(type_key: &str) {
        DISPATCH_TOTAL.with_label_values(&[type_key]).inc();
    }

    pub fn record_channel_result(channel: &str, success: bool) {
        let result = if success { "success" } else { "failure" };
        CHANNEL_RESULTS_TOTAL
            .with_label_values(&[channel, result])
            .inc();
    }
}

/// Helper struct for recording queue metrics
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn record_enqueued() {
        QUEUE_ENQUEUED_TOTAL.inc();
    }

    pub fn record_claimed(count: u64) {
        QUEUE_CLAIMED_TOTAL.inc_by(count);
    }

    pub fn record_cancelled() {
        QUEUE_CANCELLED_TOTAL.inc();
    }

    pub fn record_sent() {
        QUEUE_PROCESSED_TOTAL.with_label_values(&["sent"]).inc();
    }

    pub fn record_failed() {
        QUEUE_PROCESSED_TOTAL.with_label_values(&["failed"]).inc();
    }
}

/// Helper struct for recording reminder metrics
pub struct ReminderMetrics;

impl ReminderMetrics {
    pub fn record_generated(kind: &str) {
        REMINDERS_GENERATED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn record_deduped() {
        REMINDERS_DEDUPED_TOTAL.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        EmailMetrics::record_sent_primary();
        QueueMetrics::record_enqueued();

        let encoded = encode_metrics().unwrap();
        assert!(encoded.contains("fete_notify_emails_sent_total"));
        assert!(encoded.contains("fete_notify_queue_enqueued_total"));
    }

    #[test]
    fn test_counters_increment() {
        let before = PUSH_DEACTIVATED_TOTAL.get();
        PushMetrics::record_deactivated();
        // Other tests may bump the shared registry concurrently
        assert!(PUSH_DEACTIVATED_TOTAL.get() >= before + 1);
    }
}
