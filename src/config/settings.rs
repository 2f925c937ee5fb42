use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub email: EmailConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub queue: QueueWorkerConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

/// Platform constants merged into every variable context.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_product_name")]
    pub product_name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

/// Which backend the owned stores use.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// "memory" or "postgres"
    #[serde(default = "default_storage_backend")]
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Base URL of the primary transactional-email HTTP API
    #[serde(default = "default_email_api_url")]
    pub api_url: String,
    /// API key for the primary provider
    pub api_key: String,
    /// Display name used on the From header
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Sender aliases, selected by message category
    #[serde(default)]
    pub senders: SenderAliases,
    /// Per-call delivery timeout in seconds
    #[serde(default = "default_email_timeout")]
    pub timeout_seconds: u64,
    /// SMTP fallback transport
    #[serde(default)]
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenderAliases {
    #[serde(default = "default_sender_default")]
    pub default_address: String,
    #[serde(default = "default_sender_bookings")]
    pub bookings: String,
    #[serde(default = "default_sender_payments")]
    pub payments: String,
    #[serde(default = "default_sender_support")]
    pub support: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub use_tls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// PEM-encoded P-256 private key for VAPID signing
    #[serde(default)]
    pub vapid_private_key_pem: String,
    /// Base64url-encoded public key sent in the `k=` parameter
    #[serde(default)]
    pub vapid_public_key: String,
    /// VAPID subject, a mailto: or https: URI identifying the sender
    #[serde(default = "default_vapid_subject")]
    pub subject: String,
    /// TTL header for push messages in seconds
    #[serde(default = "default_push_ttl")]
    pub ttl_seconds: u32,
    /// Per-call delivery timeout in seconds
    #[serde(default = "default_push_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueWorkerConfig {
    /// Poll interval for due queue items in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Maximum items claimed per poll
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_reminders_enabled")]
    pub enabled: bool,
    /// Scan cadence in seconds (daily by default)
    #[serde(default = "default_scan_interval")]
    pub scan_interval_seconds: u64,
    /// Days before the event date at which reminders go out
    #[serde(default = "default_event_offsets")]
    pub event_offsets_days: Vec<i64>,
    /// Minimum age in days before a pending approval/payment nags
    #[serde(default = "default_pending_age")]
    pub pending_action_age_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_otel_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_product_name() -> String {
    "Fete".to_string()
}

fn default_base_url() -> String {
    "https://app.fete.events".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300
}

fn default_storage_backend() -> String {
    "postgres".to_string()
}

fn default_email_api_url() -> String {
    "https://api.mailrelay.example.com/v1".to_string()
}

fn default_from_name() -> String {
    "Fete".to_string()
}

fn default_email_timeout() -> u64 {
    15
}

fn default_sender_default() -> String {
    "no-reply@fete.events".to_string()
}

fn default_sender_bookings() -> String {
    "bookings@fete.events".to_string()
}

fn default_sender_payments() -> String {
    "payments@fete.events".to_string()
}

fn default_sender_support() -> String {
    "support@fete.events".to_string()
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    1025
}

fn default_vapid_subject() -> String {
    "mailto:push@fete.events".to_string()
}

fn default_push_ttl() -> u32 {
    86400
}

fn default_push_timeout() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    30
}

fn default_batch_size() -> usize {
    50
}

fn default_reminders_enabled() -> bool {
    true
}

fn default_scan_interval() -> u64 {
    86400
}

fn default_event_offsets() -> Vec<i64> {
    vec![1, 3, 7]
}

fn default_pending_age() -> i64 {
    2
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "fete-notification-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("database.url", "postgres://localhost:5432/fete_notifications")?
            .set_default("email.api_key", "")?
            .set_default("queue.poll_interval_seconds", 30)?
            .set_default("queue.batch_size", 50)?
            .set_default("reminders.scan_interval_seconds", 86400)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // DATABASE_URL, EMAIL_API_KEY, PUSH_VAPID_PUBLIC_KEY, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            product_name: default_product_name(),
            base_url: default_base_url(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
        }
    }
}

impl Default for SenderAliases {
    fn default() -> Self {
        Self {
            default_address: default_sender_default(),
            bookings: default_sender_bookings(),
            payments: default_sender_payments(),
            support: default_sender_support(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            use_tls: false,
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            vapid_private_key_pem: String::new(),
            vapid_public_key: String::new(),
            subject: default_vapid_subject(),
            ttl_seconds: default_push_ttl(),
            timeout_seconds: default_push_timeout(),
        }
    }
}

impl Default for QueueWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: default_reminders_enabled(),
            scan_interval_seconds: default_scan_interval(),
            event_offsets_days: default_event_offsets(),
            pending_action_age_days: default_pending_age(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_otel_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let service = ServiceConfig::default();
        assert_eq!(service.product_name, "Fete");
        assert_eq!(service.base_url, "https://app.fete.events");

        let queue = QueueWorkerConfig::default();
        assert_eq!(queue.poll_interval_seconds, 30);
        assert_eq!(queue.batch_size, 50);
    }

    #[test]
    fn test_default_reminder_offsets() {
        let reminders = ReminderConfig::default();
        assert!(reminders.enabled);
        assert_eq!(reminders.event_offsets_days, vec![1, 3, 7]);
        assert_eq!(reminders.pending_action_age_days, 2);
    }

    #[test]
    fn test_sender_aliases_default() {
        let senders = SenderAliases::default();
        assert_eq!(senders.default_address, "no-reply@fete.events");
        assert_eq!(senders.bookings, "bookings@fete.events");
    }
}
