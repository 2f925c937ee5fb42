//! Dispatch orchestrator.
//!
//! Resolves the registry definition for an event, builds the variable
//! context from caller data, platform constants and user identity, then fans
//! out to the channel adapters. Channels run concurrently and fail
//! independently: one adapter's error becomes an unsuccessful entry in the
//! result map and never aborts its siblings. Partial failure is normal
//! behavior, not an exception.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::channels::{EmailChannel, InAppChannel, PushChannel};
use crate::config::ServiceConfig;
use crate::directory::UserDirectory;
use crate::error::Result;
use crate::metrics::DispatchMetrics;
use crate::registry::{Channel, NotificationRegistry, NotificationTypeDefinition};
use crate::template::substitute_str;

/// Caller overrides for one send.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Replace the definition's channel list entirely
    pub channels: Option<Vec<Channel>>,
    pub skip_email: bool,
    pub skip_push: bool,
    pub skip_in_app: bool,
}

impl SendOptions {
    pub fn channels(mut self, channels: Vec<Channel>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn skip_email(mut self) -> Self {
        self.skip_email = true;
        self
    }

    pub fn skip_push(mut self) -> Self {
        self.skip_push = true;
        self
    }

    pub fn skip_in_app(mut self) -> Self {
        self.skip_in_app = true;
        self
    }
}

/// Result of one channel within a send.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Adapter-specific outcome (subject, counts, record id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl ChannelResult {
    fn ok(detail: impl Serialize) -> Self {
        Self {
            success: true,
            error: None,
            detail: serde_json::to_value(detail).ok(),
        }
    }

    fn ok_with(success: bool, error: Option<String>, detail: impl Serialize) -> Self {
        Self {
            success,
            error,
            detail: serde_json::to_value(detail).ok(),
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            detail: None,
        }
    }
}

/// Outcome of one orchestrated send.
#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub type_key: String,
    pub user_id: i64,
    pub channels: HashMap<Channel, ChannelResult>,
}

impl SendOutcome {
    pub fn channel(&self, channel: Channel) -> Option<&ChannelResult> {
        self.channels.get(&channel)
    }

    /// Advisory only: partial failure is expected behavior.
    pub fn all_succeeded(&self) -> bool {
        self.channels.values().all(|r| r.success)
    }
}

/// Multi-channel dispatch orchestrator.
pub struct Dispatcher {
    registry: Arc<NotificationRegistry>,
    directory: Arc<dyn UserDirectory>,
    email: Arc<EmailChannel>,
    push: Arc<PushChannel>,
    inapp: Arc<InAppChannel>,
    product_name: String,
    base_url: String,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<NotificationRegistry>,
        directory: Arc<dyn UserDirectory>,
        email: Arc<EmailChannel>,
        push: Arc<PushChannel>,
        inapp: Arc<InAppChannel>,
        service: &ServiceConfig,
    ) -> Self {
        Self {
            registry,
            directory,
            email,
            push,
            inapp,
            product_name: service.product_name.clone(),
            base_url: service.base_url.clone(),
        }
    }

    /// Send a notification across the channels configured for `type_key`.
    ///
    /// The call fails as a whole only when the type key is unknown (a caller
    /// bug) or the user directory is unreachable. Everything downstream is
    /// captured per channel in the result map.
    #[tracing::instrument(name = "dispatch.send", skip(self, data, options), fields(type_key = %type_key, user_id = user_id))]
    pub async fn send(
        &self,
        type_key: &str,
        user_id: i64,
        data: serde_json::Value,
        options: SendOptions,
    ) -> Result<SendOutcome> {
        let definition = self.registry.resolve(type_key)?;

        let identity = self.directory.identity(user_id).await?;
        if identity.is_none() {
            tracing::warn!(user_id = user_id, "User not found in directory, email will be skipped");
        }
        let (user_email, display_name) = identity
            .map(|i| (i.email, i.display_name))
            .unwrap_or_default();

        let context = self.build_context(&data, user_id, &user_email, &display_name);

        let channels = self.effective_channels(definition, &options);
        DispatchMetrics::record_send(type_key);

        // The three adapters run concurrently; a slow channel delays only
        // its own entry in the result map.
        let email_future = self.run_email(definition, &channels, &user_email, &display_name, &context);
        let push_future = self.run_push(definition, &channels, user_id, &context);
        let inapp_future = self.run_inapp(definition, &channels, user_id, &context);

        let (email_result, push_result, inapp_result) =
            tokio::join!(email_future, push_future, inapp_future);

        let mut results = HashMap::new();
        if let Some(result) = email_result {
            DispatchMetrics::record_channel_result("email", result.success);
            results.insert(Channel::Email, result);
        }
        if let Some(result) = push_result {
            DispatchMetrics::record_channel_result("push", result.success);
            results.insert(Channel::Push, result);
        }
        if let Some(result) = inapp_result {
            DispatchMetrics::record_channel_result("in_app", result.success);
            results.insert(Channel::InApp, result);
        }

        tracing::debug!(
            type_key = %type_key,
            user_id = user_id,
            channels = results.len(),
            all_succeeded = results.values().all(|r| r.success),
            "Dispatch completed"
        );

        Ok(SendOutcome {
            type_key: type_key.to_string(),
            user_id,
            channels: results,
        })
    }

    /// Fire-and-forget variant for business callers: the send runs on a
    /// detached task and its outcome is logged, never joined into the
    /// caller's control flow.
    pub fn send_detached(
        self: &Arc<Self>,
        type_key: impl Into<String>,
        user_id: i64,
        data: serde_json::Value,
        options: SendOptions,
    ) {
        let dispatcher = Arc::clone(self);
        let type_key = type_key.into();

        tokio::spawn(async move {
            match dispatcher.send(&type_key, user_id, data, options).await {
                Ok(outcome) => {
                    if !outcome.all_succeeded() {
                        tracing::warn!(
                            type_key = %type_key,
                            user_id = user_id,
                            "Detached dispatch completed with partial channel failure"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(
                        type_key = %type_key,
                        user_id = user_id,
                        error = %e,
                        "Detached dispatch failed"
                    );
                }
            }
        });
    }

    /// Merge platform constants, user identity and caller data into one
    /// variable context. Caller data wins on key collisions.
    fn build_context(
        &self,
        data: &serde_json::Value,
        user_id: i64,
        user_email: &str,
        display_name: &str,
    ) -> serde_json::Map<String, serde_json::Value> {
        let mut context = serde_json::Map::new();
        context.insert("product_name".to_string(), serde_json::json!(self.product_name));
        context.insert("base_url".to_string(), serde_json::json!(self.base_url));
        context.insert(
            "current_year".to_string(),
            serde_json::json!(chrono::Utc::now().format("%Y").to_string()),
        );
        context.insert("user_id".to_string(), serde_json::json!(user_id));
        context.insert("user_email".to_string(), serde_json::json!(user_email));
        context.insert("display_name".to_string(), serde_json::json!(display_name));

        if let serde_json::Value::Object(map) = data {
            for (key, value) in map {
                context.insert(key.clone(), value.clone());
            }
        }

        context
    }

    fn effective_channels(
        &self,
        definition: &NotificationTypeDefinition,
        options: &SendOptions,
    ) -> Vec<Channel> {
        let base = options
            .channels
            .clone()
            .unwrap_or_else(|| definition.channels.clone());

        base.into_iter()
            .filter(|channel| match channel {
                Channel::Email => !options.skip_email,
                Channel::Push => !options.skip_push,
                Channel::InApp => !options.skip_in_app,
            })
            .collect()
    }

    async fn run_email(
        &self,
        definition: &NotificationTypeDefinition,
        channels: &[Channel],
        user_email: &str,
        display_name: &str,
        context: &serde_json::Map<String, serde_json::Value>,
    ) -> Option<ChannelResult> {
        if !channels.contains(&Channel::Email) {
            return None;
        }

        let Some(template_key) = definition.email_template_key else {
            return Some(ChannelResult::failed("no email template configured"));
        };

        if user_email.is_empty() {
            return Some(ChannelResult::failed("user has no email address"));
        }

        let result = self
            .email
            .send(template_key, user_email, display_name, definition.email_category, context)
            .await;

        Some(ChannelResult::ok_with(
            result.success,
            result.error.clone(),
            result,
        ))
    }

    async fn run_push(
        &self,
        definition: &NotificationTypeDefinition,
        channels: &[Channel],
        user_id: i64,
        context: &serde_json::Map<String, serde_json::Value>,
    ) -> Option<ChannelResult> {
        if !channels.contains(&Channel::Push) {
            return None;
        }

        let (Some(title), Some(body)) = (definition.push_title, definition.push_body) else {
            return Some(ChannelResult::failed("no push copy configured"));
        };

        let title = substitute_str(title, context);
        let body = substitute_str(body, context);
        let action_url = context.get("action_url").and_then(|v| v.as_str());

        match self
            .push
            .send(user_id, &title, &body, action_url, definition.icon)
            .await
        {
            Ok(result) => {
                let error = (!result.success)
                    .then(|| format!("push delivery failed for all {} subscriptions", result.total));
                Some(ChannelResult::ok_with(result.success, error, result))
            }
            Err(e) => Some(ChannelResult::failed(e.to_string())),
        }
    }

    async fn run_inapp(
        &self,
        definition: &NotificationTypeDefinition,
        channels: &[Channel],
        user_id: i64,
        context: &serde_json::Map<String, serde_json::Value>,
    ) -> Option<ChannelResult> {
        if !channels.contains(&Channel::InApp) {
            return None;
        }

        let (Some(title), Some(message)) = (definition.inapp_title, definition.inapp_message)
        else {
            return Some(ChannelResult::failed("no in-app copy configured"));
        };

        let title = substitute_str(title, context);
        let message = substitute_str(message, context);
        let related_id = context.get("related_id").and_then(|v| v.as_i64());
        let related_type = context.get("related_type").and_then(|v| v.as_str());
        let action_url = context.get("action_url").and_then(|v| v.as_str());

        match self
            .inapp
            .create(
                user_id,
                definition.type_key,
                &title,
                &message,
                related_id,
                related_type,
                action_url,
                definition.icon,
            )
            .await
        {
            Ok(result) => Some(ChannelResult::ok(result)),
            Err(e) => Some(ChannelResult::failed(e.to_string())),
        }
    }
}
