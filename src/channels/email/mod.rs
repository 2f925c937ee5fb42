//! Email channel adapter.
//!
//! Resolves the stored template, renders it against the variable context,
//! picks the sender alias for the message category, and delivers through the
//! primary HTTP provider with an SMTP fallback. Every send produces exactly
//! one delivery-log entry reflecting the final outcome.

mod http_provider;
mod mock;
mod provider;
mod smtp_provider;

pub use http_provider::HttpEmailProvider;
pub use mock::MockEmailProvider;
pub use provider::{EmailContent, EmailProvider, SentEmail};
pub use smtp_provider::SmtpProvider;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;

use crate::audit::{DeliveryLogStore, NewDeliveryLogEntry};
use crate::config::{EmailConfig, SenderAliases};
use crate::error::{NotificationError, Result};
use crate::metrics::EmailMetrics;
use crate::template::TemplateStore;

/// Outcome of one email send.
#[derive(Debug, Clone, Serialize)]
pub struct EmailSendResult {
    pub success: bool,
    pub template_key: String,
    pub subject: Option<String>,
    /// Transport that carried the message, when delivery succeeded
    pub provider: Option<String>,
    pub error: Option<String>,
}

impl EmailSendResult {
    fn failure(template_key: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            template_key: template_key.to_string(),
            subject: None,
            provider: None,
            error: Some(error.into()),
        }
    }
}

/// Email channel adapter.
pub struct EmailChannel {
    templates: Arc<dyn TemplateStore>,
    primary: Arc<dyn EmailProvider>,
    fallback: Arc<dyn EmailProvider>,
    delivery_log: Arc<dyn DeliveryLogStore>,
    from_name: String,
    senders: SenderAliases,
    send_timeout: Duration,
}

impl EmailChannel {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        primary: Arc<dyn EmailProvider>,
        fallback: Arc<dyn EmailProvider>,
        delivery_log: Arc<dyn DeliveryLogStore>,
        config: &EmailConfig,
    ) -> Self {
        Self {
            templates,
            primary,
            fallback,
            delivery_log,
            from_name: config.from_name.clone(),
            senders: config.senders.clone(),
            send_timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// Sender alias for a message category, falling back to the default
    /// address for unknown or absent categories.
    pub fn sender_for_category(&self, category: Option<&str>) -> &str {
        match category {
            Some("bookings") => &self.senders.bookings,
            Some("payments") => &self.senders.payments,
            Some("support") => &self.senders.support,
            _ => &self.senders.default_address,
        }
    }

    /// Render and deliver one email.
    ///
    /// Never returns an error: every failure mode collapses into an
    /// unsuccessful [`EmailSendResult`] so callers (the orchestrator, the
    /// queue worker) can treat it as data.
    #[tracing::instrument(
        name = "email.send",
        skip(self, context),
        fields(template_key = %template_key, to = %to_email)
    )]
    pub async fn send(
        &self,
        template_key: &str,
        to_email: &str,
        to_name: &str,
        category: Option<&str>,
        context: &serde_json::Map<String, serde_json::Value>,
    ) -> EmailSendResult {
        // Resolve the template; a missing key fails this channel only
        let template = match self.templates.fetch(template_key).await {
            Ok(Some(template)) => template,
            Ok(None) => {
                tracing::warn!(template_key = %template_key, "Email template not found");
                self.log_failure(template_key, to_email, None, "template not found")
                    .await;
                return EmailSendResult::failure(template_key, "template not found");
            }
            Err(e) => {
                tracing::error!(template_key = %template_key, error = %e, "Template store lookup failed");
                self.log_failure(template_key, to_email, None, &e.to_string())
                    .await;
                return EmailSendResult::failure(template_key, e.to_string());
            }
        };

        let rendered = template.render(context);
        let content = EmailContent {
            from_email: self.sender_for_category(category).to_string(),
            from_name: self.from_name.clone(),
            to_email: to_email.to_string(),
            to_name: to_name.to_string(),
            subject: rendered.subject.clone(),
            html_body: rendered.html.clone(),
            text_body: rendered.text,
        };

        // Primary first; any failure (including timeout) falls back to SMTP
        let primary_error = match self.attempt(self.primary.as_ref(), &content).await {
            Ok(_) => {
                EmailMetrics::record_sent_primary();
                self.log_success(template_key, &content, self.primary.name())
                    .await;
                return EmailSendResult {
                    success: true,
                    template_key: template_key.to_string(),
                    subject: Some(rendered.subject),
                    provider: Some(self.primary.name().to_string()),
                    error: None,
                };
            }
            Err(e) => e,
        };

        tracing::warn!(
            template_key = %template_key,
            to = %to_email,
            error = %primary_error,
            "Primary email provider failed, falling back to SMTP"
        );

        match self.attempt(self.fallback.as_ref(), &content).await {
            Ok(_) => {
                EmailMetrics::record_sent_fallback();
                self.log_success(template_key, &content, self.fallback.name())
                    .await;
                EmailSendResult {
                    success: true,
                    template_key: template_key.to_string(),
                    subject: Some(rendered.subject),
                    provider: Some(self.fallback.name().to_string()),
                    error: None,
                }
            }
            Err(fallback_error) => {
                EmailMetrics::record_failed();
                let detail = format!(
                    "primary: {}; fallback: {}",
                    primary_error, fallback_error
                );
                tracing::error!(
                    template_key = %template_key,
                    to = %to_email,
                    error = %detail,
                    "Email delivery failed on both transports"
                );
                self.log_failure(template_key, to_email, Some(&rendered.subject), &detail)
                    .await;
                EmailSendResult {
                    success: false,
                    template_key: template_key.to_string(),
                    subject: Some(rendered.subject),
                    provider: None,
                    error: Some(detail),
                }
            }
        }
    }

    /// One bounded delivery attempt; a hung provider becomes a transient
    /// timeout error and follows the normal fallback path.
    async fn attempt(&self, provider: &dyn EmailProvider, content: &EmailContent) -> Result<SentEmail> {
        match timeout(self.send_timeout, provider.send(content)).await {
            Ok(result) => result,
            Err(_) => Err(NotificationError::TransientProvider(format!(
                "{} send timed out after {}s",
                provider.name(),
                self.send_timeout.as_secs()
            ))),
        }
    }

    async fn log_success(&self, template_key: &str, content: &EmailContent, provider: &str) {
        let entry = NewDeliveryLogEntry::sent(
            template_key,
            &content.to_email,
            &content.subject,
            provider,
            &content.html_body,
        );
        if let Err(e) = self.delivery_log.append(entry).await {
            tracing::warn!(error = %e, "Failed to append sent delivery-log entry");
        }
    }

    async fn log_failure(
        &self,
        template_key: &str,
        to_email: &str,
        subject: Option<&str>,
        error: &str,
    ) {
        let mut entry = NewDeliveryLogEntry::failed(template_key, to_email, error);
        if let Some(subject) = subject {
            entry = entry.subject(subject);
        }
        if let Err(e) = self.delivery_log.append(entry).await {
            tracing::warn!(error = %e, "Failed to append failed delivery-log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{DeliveryStatus, MemoryDeliveryLog};
    use crate::template::MemoryTemplateStore;
    use serde_json::json;

    fn context() -> serde_json::Map<String, serde_json::Value> {
        json!({
            "display_name": "Ada",
            "client_name": "Grace",
            "product_name": "Fete",
            "base_url": "https://app.fete.events",
            "current_year": 2026
        })
        .as_object()
        .unwrap()
        .clone()
    }

    fn channel(
        primary: MockEmailProvider,
        fallback: MockEmailProvider,
    ) -> (EmailChannel, Arc<MemoryDeliveryLog>) {
        let log = Arc::new(MemoryDeliveryLog::new());
        let config = EmailConfig {
            api_url: "https://api.example.com".to_string(),
            api_key: "k".to_string(),
            from_name: "Fete".to_string(),
            senders: Default::default(),
            timeout_seconds: 2,
            smtp: Default::default(),
        };
        let channel = EmailChannel::new(
            Arc::new(MemoryTemplateStore::seeded()),
            Arc::new(primary),
            Arc::new(fallback),
            log.clone(),
            &config,
        );
        (channel, log)
    }

    #[tokio::test]
    async fn test_send_via_primary() {
        let (channel, log) = channel(MockEmailProvider::new(), MockEmailProvider::new());

        let result = channel
            .send("booking_created", "vendor@example.com", "Ada", Some("bookings"), &context())
            .await;

        assert!(result.success);
        assert_eq!(result.provider.as_deref(), Some("mock"));
        assert_eq!(result.subject.as_deref(), Some("New booking request from Grace"));

        // Exactly one log entry, reflecting success with the rendered HTML
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, DeliveryStatus::Sent);
        assert!(entries[0].html_body.as_deref().unwrap().contains("Grace"));
    }

    #[tokio::test]
    async fn test_fallback_on_primary_failure() {
        let (channel, log) = channel(
            MockEmailProvider::failing("primary down"),
            MockEmailProvider::new(),
        );

        let result = channel
            .send("booking_created", "vendor@example.com", "Ada", None, &context())
            .await;

        assert!(result.success);
        // Still exactly one log entry, for the final (fallback) outcome
        assert_eq!(log.count(), 1);
        assert_eq!(log.entries()[0].status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn test_both_transports_fail() {
        let (channel, log) = channel(
            MockEmailProvider::failing("primary down"),
            MockEmailProvider::failing("smtp down"),
        );

        let result = channel
            .send("booking_created", "vendor@example.com", "Ada", None, &context())
            .await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("primary down"));
        assert!(error.contains("smtp down"));

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, DeliveryStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_template() {
        let (channel, log) = channel(MockEmailProvider::new(), MockEmailProvider::new());

        let result = channel
            .send("nonexistent_template", "a@example.com", "A", None, &context())
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("template not found"));
        assert_eq!(log.entries()[0].status, DeliveryStatus::Failed);
    }

    #[tokio::test]
    async fn test_sender_category_lookup() {
        let (channel, _log) = channel(MockEmailProvider::new(), MockEmailProvider::new());

        assert_eq!(channel.sender_for_category(Some("bookings")), "bookings@fete.events");
        assert_eq!(channel.sender_for_category(Some("payments")), "payments@fete.events");
        assert_eq!(channel.sender_for_category(Some("support")), "support@fete.events");
        assert_eq!(channel.sender_for_category(Some("marketing")), "no-reply@fete.events");
        assert_eq!(channel.sender_for_category(None), "no-reply@fete.events");
    }
}
