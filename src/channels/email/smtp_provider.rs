//! SMTP fallback transport using lettre.
//!
//! Used when the primary HTTP provider fails; also the whole email path for
//! local development against MailHog/Mailpit.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;
use crate::error::{NotificationError, Result};

use super::provider::{EmailContent, EmailProvider, SentEmail};

/// SMTP email transport.
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpProvider {
    /// Build the transport once from configuration.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let transport = Self::build_transport(config)?;
        Ok(Self { transport })
    }

    fn build_transport(config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let transport = if config.use_tls {
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| {
                    NotificationError::Configuration(format!("failed to create SMTP relay: {}", e))
                })?
                .port(config.port);

            if let (Some(username), Some(password)) = (&config.username, &config.password) {
                builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
            }

            builder.build()
        } else {
            // Non-TLS transport for local dev servers like Mailpit
            let mut builder =
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                    .port(config.port);

            if let (Some(username), Some(password)) = (&config.username, &config.password) {
                builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
            }

            builder.build()
        };

        Ok(transport)
    }

    fn build_message(&self, email: &EmailContent) -> Result<Message> {
        let from: Mailbox = format!("{} <{}>", email.from_name, email.from_email)
            .parse()
            .map_err(|e| {
                NotificationError::PermanentProvider(format!("invalid from address: {}", e))
            })?;

        let to: Mailbox = if email.to_name.is_empty() {
            email.to_email.parse()
        } else {
            format!("{} <{}>", email.to_name, email.to_email).parse()
        }
        .map_err(|e| NotificationError::PermanentProvider(format!("invalid to address: {}", e)))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| {
                NotificationError::PermanentProvider(format!("failed to build message: {}", e))
            })?;

        Ok(message)
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &EmailContent) -> Result<SentEmail> {
        tracing::debug!(
            to = %email.to_email,
            subject = %email.subject,
            "Sending email via SMTP"
        );

        let message = self.build_message(email)?;

        let response = self.transport.send(message).await.map_err(|e| {
            NotificationError::TransientProvider(format!("SMTP send failed: {}", e))
        })?;

        let message_id = response.message().next().map(|s| s.to_string());

        tracing::debug!(
            to = %email.to_email,
            message_id = ?message_id,
            "Email accepted by SMTP transport"
        );

        Ok(SentEmail { message_id })
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_construction() {
        let config = SmtpConfig::default();
        let provider = SmtpProvider::new(&config).unwrap();
        assert_eq!(provider.name(), "smtp");
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let provider = SmtpProvider::new(&SmtpConfig::default()).unwrap();
        let email = EmailContent {
            from_email: "not an address".to_string(),
            from_name: "Fete".to_string(),
            to_email: "a@example.com".to_string(),
            ..Default::default()
        };

        assert!(provider.build_message(&email).is_err());
    }

    #[test]
    fn test_build_message_multipart() {
        let provider = SmtpProvider::new(&SmtpConfig::default()).unwrap();
        let email = EmailContent {
            from_email: "no-reply@fete.events".to_string(),
            from_name: "Fete".to_string(),
            to_email: "a@example.com".to_string(),
            to_name: "Ada".to_string(),
            subject: "Hello".to_string(),
            html_body: "<p>Hi</p>".to_string(),
            text_body: "Hi".to_string(),
        };

        assert!(provider.build_message(&email).is_ok());
    }
}
