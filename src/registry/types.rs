use serde::{Deserialize, Serialize};

/// One delivery surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Push,
    InApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Push => "push",
            Channel::InApp => "in_app",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static definition of one notification type: which channels it goes out on
/// and the copy each channel renders.
///
/// Push and in-app copy are `{{variable}}` templates rendered against the
/// dispatch context; email copy lives in the template store under
/// `email_template_key`.
#[derive(Debug, Clone)]
pub struct NotificationTypeDefinition {
    pub type_key: &'static str,
    /// Ordered set of channels this type is delivered on
    pub channels: Vec<Channel>,
    pub email_template_key: Option<&'static str>,
    /// Sender-alias category for the email channel ("bookings", "payments", "support")
    pub email_category: Option<&'static str>,
    pub push_title: Option<&'static str>,
    pub push_body: Option<&'static str>,
    pub inapp_title: Option<&'static str>,
    pub inapp_message: Option<&'static str>,
    pub icon: Option<&'static str>,
}

impl NotificationTypeDefinition {
    pub fn new(type_key: &'static str, channels: &[Channel]) -> Self {
        Self {
            type_key,
            channels: channels.to_vec(),
            email_template_key: None,
            email_category: None,
            push_title: None,
            push_body: None,
            inapp_title: None,
            inapp_message: None,
            icon: None,
        }
    }

    pub fn email(mut self, template_key: &'static str, category: &'static str) -> Self {
        self.email_template_key = Some(template_key);
        self.email_category = Some(category);
        self
    }

    pub fn push(mut self, title: &'static str, body: &'static str) -> Self {
        self.push_title = Some(title);
        self.push_body = Some(body);
        self
    }

    pub fn inapp(mut self, title: &'static str, message: &'static str) -> Self {
        self.inapp_title = Some(title);
        self.inapp_message = Some(message);
        self
    }

    pub fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn has_channel(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }
}
