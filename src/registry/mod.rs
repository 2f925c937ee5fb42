//! Static registry of notification types.
//!
//! Maps an event type key to the channels it goes out on and the copy each
//! channel uses. Built once at process start and never mutated; an unknown
//! key is a caller bug, not a delivery failure.

mod types;

pub use types::{Channel, NotificationTypeDefinition};

use std::collections::HashMap;

use crate::error::{NotificationError, Result};

/// Immutable lookup table from type key to definition.
pub struct NotificationRegistry {
    definitions: HashMap<&'static str, NotificationTypeDefinition>,
}

impl NotificationRegistry {
    /// Look up a definition; `None` means the caller passed an unknown key.
    pub fn lookup(&self, type_key: &str) -> Option<&NotificationTypeDefinition> {
        self.definitions.get(type_key)
    }

    /// Like [`lookup`](Self::lookup), but surfaces the caller error directly.
    pub fn resolve(&self, type_key: &str) -> Result<&NotificationTypeDefinition> {
        self.lookup(type_key).ok_or_else(|| {
            NotificationError::Configuration(format!("unknown notification type key: {}", type_key))
        })
    }

    pub fn type_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.definitions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Build the platform's notification type table.
///
/// The set of keys is fixed at compile time; adding a type means adding a
/// definition here plus its email template in the template store seed.
pub fn build_registry() -> NotificationRegistry {
    use Channel::{Email, InApp, Push};

    let defs = vec![
        NotificationTypeDefinition::new("booking_created", &[Email, Push, InApp])
            .email("booking_created", "bookings")
            .push("New booking request", "{{client_name}} requested {{service_name}} for {{event_date}}")
            .inapp("New booking request", "{{client_name}} requested {{service_name}} for {{event_date}}")
            .icon("calendar-plus"),
        NotificationTypeDefinition::new("booking_accepted", &[Email, Push, InApp])
            .email("booking_accepted", "bookings")
            .push("Booking confirmed", "{{vendor_name}} accepted your booking for {{event_date}}")
            .inapp("Booking confirmed", "{{vendor_name}} accepted your booking for {{event_date}}")
            .icon("calendar-check"),
        NotificationTypeDefinition::new("booking_declined", &[Email, Push, InApp])
            .email("booking_declined", "bookings")
            .push("Booking declined", "{{vendor_name}} can't take your booking for {{event_date}}")
            .inapp("Booking declined", "{{vendor_name}} declined your booking for {{event_date}}")
            .icon("calendar-x"),
        NotificationTypeDefinition::new("booking_cancelled", &[Email, Push, InApp])
            .email("booking_cancelled", "bookings")
            .push("Booking cancelled", "The booking for {{event_date}} was cancelled by {{cancelled_by}}")
            .inapp("Booking cancelled", "The booking for {{event_date}} was cancelled by {{cancelled_by}}")
            .icon("calendar-x"),
        NotificationTypeDefinition::new("booking_reminder", &[Email, Push])
            .email("booking_reminder", "bookings")
            .push("Upcoming event", "{{service_name}} on {{event_date}} is coming up")
            .icon("bell"),
        NotificationTypeDefinition::new("message_received", &[Push, InApp])
            .push("New message", "{{sender_name}}: {{preview}}")
            .inapp("New message from {{sender_name}}", "{{preview}}")
            .icon("message"),
        NotificationTypeDefinition::new("payment_received", &[Email, Push, InApp])
            .email("payment_received", "payments")
            .push("Payment received", "{{amount}} received for the booking on {{event_date}}")
            .inapp("Payment received", "{{amount}} received for the booking on {{event_date}}")
            .icon("credit-card"),
        NotificationTypeDefinition::new("payment_reminder", &[Email, InApp])
            .email("payment_reminder", "payments")
            .inapp("Payment due", "The booking for {{event_date}} is awaiting payment")
            .icon("credit-card"),
        NotificationTypeDefinition::new("vendor_approved", &[Email, Push, InApp])
            .email("vendor_approved", "support")
            .push("Profile approved", "Your {{product_name}} vendor profile is live")
            .inapp("Profile approved", "Your vendor profile is live and taking bookings")
            .icon("badge-check"),
        NotificationTypeDefinition::new("vendor_rejected", &[Email, InApp])
            .email("vendor_rejected", "support")
            .inapp("Profile needs changes", "Your vendor profile was not approved: {{reason}}")
            .icon("badge-x"),
        NotificationTypeDefinition::new("review_received", &[Email, Push, InApp])
            .email("review_received", "bookings")
            .push("New review", "{{client_name}} left a {{rating}}-star review")
            .inapp("New review", "{{client_name}} left a {{rating}}-star review")
            .icon("star"),
        NotificationTypeDefinition::new("review_request", &[Email, InApp])
            .email("review_request", "bookings")
            .inapp("How was {{service_name}}?", "Leave a review for your booking on {{event_date}}")
            .icon("star"),
    ];

    let mut definitions = HashMap::with_capacity(defs.len());
    for def in defs {
        definitions.insert(def.type_key, def);
    }

    NotificationRegistry { definitions }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_key() {
        let registry = build_registry();
        let def = registry.lookup("booking_created").unwrap();
        assert!(def.has_channel(Channel::Email));
        assert!(def.has_channel(Channel::Push));
        assert!(def.has_channel(Channel::InApp));
        assert_eq!(def.email_template_key, Some("booking_created"));
    }

    #[test]
    fn test_lookup_unknown_key() {
        let registry = build_registry();
        assert!(registry.lookup("no_such_event").is_none());
        assert!(registry.resolve("no_such_event").is_err());
    }

    /// Every channel a definition lists must have its copy present, so a
    /// send can never hit a definition with a null template.
    #[test]
    fn test_config_completeness() {
        let registry = build_registry();
        assert!(!registry.is_empty());

        for key in registry.type_keys() {
            let def = registry.lookup(key).unwrap();
            assert!(!def.channels.is_empty(), "{} has no channels", key);

            if def.has_channel(Channel::Email) {
                assert!(def.email_template_key.is_some(), "{} email template missing", key);
                assert!(def.email_category.is_some(), "{} email category missing", key);
            }
            if def.has_channel(Channel::Push) {
                assert!(def.push_title.is_some(), "{} push title missing", key);
                assert!(def.push_body.is_some(), "{} push body missing", key);
            }
            if def.has_channel(Channel::InApp) {
                assert!(def.inapp_title.is_some(), "{} in-app title missing", key);
                assert!(def.inapp_message.is_some(), "{} in-app message missing", key);
            }
        }
    }

    #[test]
    fn test_channel_display() {
        assert_eq!(Channel::Email.to_string(), "email");
        assert_eq!(Channel::InApp.to_string(), "in_app");
    }
}
