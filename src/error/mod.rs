use thiserror::Error;

/// Top-level error taxonomy for the notification core.
///
/// The variants map onto how a failure is handled, not where it occurred:
/// configuration problems fail only the affected channel, transient provider
/// failures trigger fallbacks, permanent provider failures deactivate the
/// offending resource, and persistence failures are surfaced to the caller.
#[derive(Error, Debug)]
pub enum NotificationError {
    /// Unknown type key, missing template, invalid channel copy.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network error, 5xx, timeout. Eligible for the fallback path.
    #[error("Transient provider error: {0}")]
    TransientProvider(String),

    /// Invalid recipient, push endpoint reported gone. The offending
    /// resource is deactivated rather than retried.
    #[error("Permanent provider error: {0}")]
    PermanentProvider(String),

    /// Store read/write failure affecting scheduling or audit correctness.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl NotificationError {
    /// Whether the error should trigger the fallback transport (email) or be
    /// counted as a dropped delivery (push).
    pub fn is_transient(&self) -> bool {
        matches!(self, NotificationError::TransientProvider(_))
    }
}

impl From<sqlx::Error> for NotificationError {
    fn from(e: sqlx::Error) -> Self {
        NotificationError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(e: serde_json::Error) -> Self {
        NotificationError::Persistence(format!("serialization: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, NotificationError>;
