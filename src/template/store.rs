//! Email template storage boundary.
//!
//! Templates are owned by an external store; this core only fetches them per
//! send. The in-memory implementation ships seeded with the platform's stock
//! templates so the service runs complete in development and tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::error::Result;

use super::types::EmailTemplate;

/// Read boundary to the external email template store.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Fetch a template by key. `None` means no such template exists; the
    /// email adapter turns that into a graceful per-channel failure.
    async fn fetch(&self, key: &str) -> Result<Option<EmailTemplate>>;
}

/// In-memory template store.
pub struct MemoryTemplateStore {
    templates: DashMap<String, EmailTemplate>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    /// Store seeded with the platform's stock templates, one per email
    /// template key the registry references.
    pub fn seeded() -> Self {
        let store = Self::new();
        for template in stock_templates() {
            store.upsert(template);
        }
        store
    }

    pub fn upsert(&self, template: EmailTemplate) {
        self.templates.insert(template.key.clone(), template);
    }

    pub fn count(&self) -> usize {
        self.templates.len()
    }
}

impl Default for MemoryTemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn fetch(&self, key: &str) -> Result<Option<EmailTemplate>> {
        Ok(self.templates.get(key).map(|t| t.clone()))
    }
}

/// Create an Arc-wrapped seeded store.
pub fn create_template_store() -> Arc<dyn TemplateStore> {
    Arc::new(MemoryTemplateStore::seeded())
}

fn make(key: &str, subject: &str, body_html: &str, body_text: &str) -> EmailTemplate {
    EmailTemplate {
        key: key.to_string(),
        subject: subject.to_string(),
        html_header: "<div class=\"header\"><h1>{{product_name}}</h1></div>".to_string(),
        html_body: format!("<div class=\"body\">{}</div>", body_html),
        html_footer:
            "<div class=\"footer\">&copy; {{current_year}} {{product_name}} &middot; <a href=\"{{base_url}}\">{{base_url}}</a></div>"
                .to_string(),
        text_body: body_text.to_string(),
        updated_at: Utc::now(),
    }
}

fn stock_templates() -> Vec<EmailTemplate> {
    vec![
        make(
            "booking_created",
            "New booking request from {{client_name}}",
            "<p>Hi {{display_name}},</p><p>{{client_name}} requested <strong>{{service_name}}</strong> for {{event_date}}.</p><p><a href=\"{{base_url}}/bookings/{{booking_id}}\">Review the request</a></p>",
            "Hi {{display_name}},\n\n{{client_name}} requested {{service_name}} for {{event_date}}.\n\nReview it at {{base_url}}/bookings/{{booking_id}}",
        ),
        make(
            "booking_accepted",
            "Your booking for {{event_date}} is confirmed",
            "<p>Hi {{display_name}},</p><p>{{vendor_name}} accepted your booking for {{event_date}}. You're all set.</p>",
            "Hi {{display_name}},\n\n{{vendor_name}} accepted your booking for {{event_date}}. You're all set.",
        ),
        make(
            "booking_declined",
            "Your booking request for {{event_date}}",
            "<p>Hi {{display_name}},</p><p>Unfortunately {{vendor_name}} can't take your booking for {{event_date}}.</p><p><a href=\"{{base_url}}/search\">Find another vendor</a></p>",
            "Hi {{display_name}},\n\nUnfortunately {{vendor_name}} can't take your booking for {{event_date}}.",
        ),
        make(
            "booking_cancelled",
            "Booking for {{event_date}} cancelled",
            "<p>Hi {{display_name}},</p><p>The booking for {{event_date}} was cancelled by {{cancelled_by}}.</p>",
            "Hi {{display_name}},\n\nThe booking for {{event_date}} was cancelled by {{cancelled_by}}.",
        ),
        make(
            "booking_reminder",
            "Coming up: {{service_name}} on {{event_date}}",
            "<p>Hi {{display_name}},</p><p>A reminder that <strong>{{service_name}}</strong> is happening on {{event_date}}.</p><p><a href=\"{{base_url}}/bookings/{{booking_id}}\">View the booking</a></p>",
            "Hi {{display_name}},\n\nA reminder that {{service_name}} is happening on {{event_date}}.",
        ),
        make(
            "payment_received",
            "Payment of {{amount}} received",
            "<p>Hi {{display_name}},</p><p>We received {{amount}} for the booking on {{event_date}}. A receipt is available in your dashboard.</p>",
            "Hi {{display_name}},\n\nWe received {{amount}} for the booking on {{event_date}}.",
        ),
        make(
            "approval_reminder",
            "Action needed: booking request from {{client_name}}",
            "<p>Hi {{display_name}},</p><p>{{client_name}}'s request for <strong>{{service_name}}</strong> on {{event_date}} is still waiting for your response.</p><p><a href=\"{{base_url}}/bookings/{{booking_id}}\">Accept or decline</a></p>",
            "Hi {{display_name}},\n\n{{client_name}}'s request for {{service_name}} on {{event_date}} is still waiting for your response.",
        ),
        make(
            "payment_reminder",
            "Payment due for your booking on {{event_date}}",
            "<p>Hi {{display_name}},</p><p>The booking for {{event_date}} is awaiting payment. Complete it to confirm your date.</p><p><a href=\"{{base_url}}/bookings/{{booking_id}}/pay\">Pay now</a></p>",
            "Hi {{display_name}},\n\nThe booking for {{event_date}} is awaiting payment.",
        ),
        make(
            "vendor_approved",
            "Your {{product_name}} vendor profile is live",
            "<p>Hi {{display_name}},</p><p>Your vendor profile was approved and is now visible to clients.</p>",
            "Hi {{display_name}},\n\nYour vendor profile was approved and is now visible to clients.",
        ),
        make(
            "vendor_rejected",
            "Your {{product_name}} vendor profile needs changes",
            "<p>Hi {{display_name}},</p><p>Your vendor profile was not approved: {{reason}}</p><p>Update it and resubmit any time.</p>",
            "Hi {{display_name}},\n\nYour vendor profile was not approved: {{reason}}",
        ),
        make(
            "review_received",
            "{{client_name}} left you a review",
            "<p>Hi {{display_name}},</p><p>{{client_name}} left a {{rating}}-star review on your booking.</p>",
            "Hi {{display_name}},\n\n{{client_name}} left a {{rating}}-star review on your booking.",
        ),
        make(
            "review_request",
            "How was {{service_name}}?",
            "<p>Hi {{display_name}},</p><p>How did {{service_name}} go? Leave {{vendor_name}} a review to help other clients.</p><p><a href=\"{{base_url}}/bookings/{{booking_id}}/review\">Leave a review</a></p>",
            "Hi {{display_name}},\n\nHow did {{service_name}} go? Leave {{vendor_name}} a review at {{base_url}}/bookings/{{booking_id}}/review",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_store_fetch() {
        let store = MemoryTemplateStore::seeded();
        assert!(store.count() >= 10);

        let template = store.fetch("booking_created").await.unwrap().unwrap();
        assert!(template.subject.contains("{{client_name}}"));
    }

    #[tokio::test]
    async fn test_fetch_unknown_key() {
        let store = MemoryTemplateStore::seeded();
        assert!(store.fetch("nonexistent_template").await.unwrap().is_none());
    }

    /// Every email template key the registry references must exist in the
    /// seed, so a fresh environment can send every notification type.
    #[tokio::test]
    async fn test_seed_covers_registry() {
        let store = MemoryTemplateStore::seeded();
        let registry = crate::registry::build_registry();

        for key in registry.type_keys() {
            let def = registry.lookup(key).unwrap();
            if let Some(template_key) = def.email_template_key {
                assert!(
                    store.fetch(template_key).await.unwrap().is_some(),
                    "missing seed template for {}",
                    template_key
                );
            }
        }
    }
}
