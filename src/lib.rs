// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod telemetry;

// Domain layer (notification core)
pub mod audit;
pub mod channels;
pub mod directory;
pub mod dispatch;
pub mod inapp;
pub mod queue;
pub mod registry;
pub mod subscriptions;
pub mod template;

// Background workers
pub mod tasks;
