//! Primary transactional-email HTTP provider.
//!
//! Speaks a SendGrid-style JSON API: a single POST with personalizations,
//! sender, subject and content parts, authenticated with a Bearer key. The
//! client is constructed once with a bounded timeout and injected.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EmailConfig;
use crate::error::{NotificationError, Result};

use super::provider::{EmailContent, EmailProvider, SentEmail};

/// HTTP transactional email provider.
pub struct HttpEmailProvider {
    api_url: String,
    api_key: String,
    client: Client,
}

impl HttpEmailProvider {
    /// Build the provider and its HTTP client from configuration.
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                NotificationError::Configuration(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }
}

// Provider API request/response structures

#[derive(Debug, Serialize)]
struct SendRequest {
    personalizations: Vec<Personalization>,
    from: EmailAddress,
    subject: String,
    content: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Personalization {
    to: Vec<EmailAddress>,
}

#[derive(Debug, Serialize)]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    errors: Vec<ProviderErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

#[async_trait]
impl EmailProvider for HttpEmailProvider {
    async fn send(&self, email: &EmailContent) -> Result<SentEmail> {
        let request = SendRequest {
            personalizations: vec![Personalization {
                to: vec![EmailAddress {
                    email: email.to_email.clone(),
                    name: if email.to_name.is_empty() {
                        None
                    } else {
                        Some(email.to_name.clone())
                    },
                }],
            }],
            from: EmailAddress {
                email: email.from_email.clone(),
                name: Some(email.from_name.clone()),
            },
            subject: email.subject.clone(),
            content: vec![
                Content {
                    content_type: "text/plain".to_string(),
                    value: email.text_body.clone(),
                },
                Content {
                    content_type: "text/html".to_string(),
                    value: email.html_body.clone(),
                },
            ],
        };

        tracing::debug!(
            to = %email.to_email,
            subject = %email.subject,
            "Sending email via HTTP provider"
        );

        let response = self
            .client
            .post(format!("{}/mail/send", self.api_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                // Timeouts and connection failures are transient
                NotificationError::TransientProvider(format!("HTTP send failed: {}", e))
            })?;

        let status = response.status();
        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if status.is_success() {
            tracing::debug!(
                to = %email.to_email,
                message_id = ?message_id,
                "Email accepted by HTTP provider"
            );
            return Ok(SentEmail { message_id });
        }

        let error_body = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<ProviderError>(&error_body) {
            Ok(parsed) => parsed
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join(", "),
            Err(_) => error_body,
        };

        tracing::warn!(
            to = %email.to_email,
            status = %status,
            error = %detail,
            "HTTP provider rejected email"
        );

        if status.is_client_error() {
            Err(NotificationError::PermanentProvider(format!(
                "provider rejected send ({}): {}",
                status, detail
            )))
        } else {
            Err(NotificationError::TransientProvider(format!(
                "provider error ({}): {}",
                status, detail
            )))
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmailConfig {
        EmailConfig {
            api_url: "https://api.mailrelay.example.com/v1".to_string(),
            api_key: "test-key".to_string(),
            from_name: "Fete".to_string(),
            senders: Default::default(),
            timeout_seconds: 5,
            smtp: Default::default(),
        }
    }

    #[test]
    fn test_provider_construction() {
        let provider = HttpEmailProvider::new(&config()).unwrap();
        assert_eq!(provider.name(), "http");
        assert_eq!(provider.api_url, "https://api.mailrelay.example.com/v1");
    }

    #[test]
    fn test_request_serialization() {
        let request = SendRequest {
            personalizations: vec![Personalization {
                to: vec![EmailAddress {
                    email: "a@example.com".to_string(),
                    name: None,
                }],
            }],
            from: EmailAddress {
                email: "no-reply@fete.events".to_string(),
                name: Some("Fete".to_string()),
            },
            subject: "Hello".to_string(),
            content: vec![Content {
                content_type: "text/plain".to_string(),
                value: "Hi".to_string(),
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["subject"], "Hello");
        assert_eq!(json["content"][0]["type"], "text/plain");
        // Absent names are omitted entirely
        assert!(json["personalizations"][0]["to"][0].get("name").is_none());
    }
}
