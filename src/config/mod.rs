mod settings;

pub use settings::{
    DatabaseConfig, EmailConfig, OtelConfig, PushConfig, QueueWorkerConfig, ReminderConfig,
    SenderAliases, ServiceConfig, Settings, SmtpConfig, StorageConfig,
};
