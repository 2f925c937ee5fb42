//! Background tasks: queue draining and reminder generation.
//!
//! Both are interval-driven tokio tasks sharing the shutdown broadcast; no
//! dedicated OS threads.

mod queue_worker;
mod reminders;

pub use queue_worker::QueueWorkerTask;
pub use reminders::{ReminderTask, ScanSummary};
