use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio::sync::broadcast;

use fete_notification_service::channels::email::{HttpEmailProvider, SmtpProvider};
use fete_notification_service::channels::push::WebPushTransport;
use fete_notification_service::channels::{EmailChannel, InAppChannel, PushChannel};
use fete_notification_service::config::Settings;
use fete_notification_service::dispatch::Dispatcher;
use fete_notification_service::{audit, inapp, postgres, queue, subscriptions, telemetry, template};
use fete_notification_service::directory::{MemoryBookingReadModel, MemoryUserDirectory};
use fete_notification_service::registry::build_registry;
use fete_notification_service::tasks::{QueueWorkerTask, ReminderTask};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing (keep the guard alive for the process lifetime)
    let _telemetry_guard = telemetry::init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    // Shared PostgreSQL pool (memory backends skip it)
    let pool = if settings.storage.backend == "postgres" {
        Some(postgres::create_pool(&settings.database).await?)
    } else {
        None
    };

    // Owned stores
    let queue_store = queue::create_queue_store(&settings.storage, pool.clone());
    let subscription_store = subscriptions::create_subscription_store(&settings.storage, pool.clone());
    let inapp_store = inapp::create_inapp_store(&settings.storage, pool.clone());
    let delivery_log = audit::create_delivery_log(&settings.storage, pool.clone());

    // Collaborator boundaries. The directory and booking read model are
    // wired to in-process implementations here; deployments embed this
    // service next to the platform's read replicas.
    let template_store = template::create_template_store();
    let directory = Arc::new(MemoryUserDirectory::new());
    let bookings = Arc::new(MemoryBookingReadModel::new());

    // Provider clients, constructed once and injected
    let primary = Arc::new(HttpEmailProvider::new(&settings.email)?);
    let fallback = Arc::new(SmtpProvider::new(&settings.email.smtp)?);
    let push_transport = Arc::new(WebPushTransport::new(&settings.push)?);

    // Channel adapters
    let email_channel = Arc::new(EmailChannel::new(
        template_store,
        primary,
        fallback,
        delivery_log,
        &settings.email,
    ));
    let push_channel = Arc::new(PushChannel::new(subscription_store, push_transport));
    let inapp_channel = Arc::new(InAppChannel::new(inapp_store));

    // Orchestrator: the entry point business workflows call in-process.
    // The binary itself only drives the background workers.
    let registry = Arc::new(build_registry());
    let _dispatcher = Arc::new(Dispatcher::new(
        registry,
        directory,
        email_channel.clone(),
        push_channel,
        inapp_channel,
        &settings.service,
    ));
    tracing::info!("Notification dispatcher initialized");

    // Background tasks
    let (shutdown_tx, _) = broadcast::channel(1);

    let queue_worker = QueueWorkerTask::new(
        settings.queue.clone(),
        settings.service.clone(),
        queue_store.clone(),
        email_channel,
        shutdown_tx.subscribe(),
    );
    let worker_handle = tokio::spawn(async move {
        queue_worker.run().await;
    });

    let reminder_task = ReminderTask::new(
        settings.reminders.clone(),
        queue_store,
        bookings,
        shutdown_tx.subscribe(),
    );
    let reminder_handle = tokio::spawn(async move {
        reminder_task.run().await;
    });

    tracing::info!("Notification service running");

    // Wait for a shutdown signal
    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    tracing::info!("Waiting for background tasks to finish...");
    let _ = tokio::join!(worker_handle, reminder_handle);

    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("PostgreSQL connection pool closed");
    }

    tracing::info!("Notification service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
