//! Mock email transport for tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{NotificationError, Result};

use super::provider::{EmailContent, EmailProvider, SentEmail};

/// Mock email transport that captures sent emails.
pub struct MockEmailProvider {
    sent_emails: Arc<Mutex<Vec<EmailContent>>>,
    should_fail: bool,
    failure_message: Option<String>,
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self {
            sent_emails: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
            failure_message: None,
        }
    }

    /// A mock that always fails with a transient error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent_emails: Arc::new(Mutex::new(Vec::new())),
            should_fail: true,
            failure_message: Some(message.into()),
        }
    }

    /// All captured emails.
    pub async fn sent_emails(&self) -> Vec<EmailContent> {
        self.sent_emails.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent_emails.lock().await.len()
    }

    pub async fn was_sent_to(&self, email: &str) -> bool {
        self.sent_emails
            .lock()
            .await
            .iter()
            .any(|e| e.to_email == email)
    }
}

impl Default for MockEmailProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &EmailContent) -> Result<SentEmail> {
        if self.should_fail {
            let message = self
                .failure_message
                .clone()
                .unwrap_or_else(|| "mock failure".to_string());
            return Err(NotificationError::TransientProvider(message));
        }

        self.sent_emails.lock().await.push(email.clone());

        Ok(SentEmail {
            message_id: Some(format!("mock-{}", self.sent_emails.lock().await.len())),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_captures_sends() {
        let provider = MockEmailProvider::new();
        let email = EmailContent {
            to_email: "a@example.com".to_string(),
            subject: "Hello".to_string(),
            ..Default::default()
        };

        provider.send(&email).await.unwrap();
        assert_eq!(provider.sent_count().await, 1);
        assert!(provider.was_sent_to("a@example.com").await);
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let provider = MockEmailProvider::failing("quota exceeded");
        let result = provider.send(&EmailContent::default()).await;

        assert!(matches!(
            result,
            Err(NotificationError::TransientProvider(msg)) if msg == "quota exceeded"
        ));
        assert_eq!(provider.sent_count().await, 0);
    }
}
