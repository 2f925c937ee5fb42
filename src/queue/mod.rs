//! Deferred email queue.
//!
//! Business workflows enqueue emails for a future send; a background worker
//! claims due items in priority order and drives them through the email
//! adapter. Statuses move one way (`pending → sent | failed | cancelled`)
//! and the reminder scheduler uses the store's idempotency lookup to avoid
//! double-enqueueing.

mod backend;
mod factory;
mod memory_backend;
mod models;
mod postgres_backend;

pub use backend::EmailQueueStore;
pub use factory::create_queue_store;
pub use memory_backend::MemoryQueueBackend;
pub use models::{
    EmailStatus, NewQueuedEmail, QueuePage, QueuedEmail, StatusCount, META_REMINDER_KIND,
    META_REMINDER_OFFSET,
};
pub use postgres_backend::PostgresQueueBackend;
