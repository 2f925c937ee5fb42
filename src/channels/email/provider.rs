//! Email transport abstraction.
//!
//! The email adapter talks to two transports through this trait: a primary
//! HTTP transactional-email API and an SMTP fallback. A mock implementation
//! backs tests.

use async_trait::async_trait;

use crate::error::Result;

/// Email content ready for a transport.
#[derive(Debug, Clone, Default)]
pub struct EmailContent {
    pub from_email: String,
    pub from_name: String,
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// A message accepted by a transport, with its provider-side id.
#[derive(Debug, Clone)]
pub struct SentEmail {
    /// Provider-specific message ID for tracking.
    pub message_id: Option<String>,
}

/// Trait for email sending transports.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send an email.
    async fn send(&self, email: &EmailContent) -> Result<SentEmail>;

    /// Transport name for logging and the delivery log.
    fn name(&self) -> &'static str;
}
