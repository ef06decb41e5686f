use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wealthbuilders_backend::clock::SystemClock;
use wealthbuilders_backend::config::AppConfig;
use wealthbuilders_backend::lifecycle::InvestmentService;
use wealthbuilders_backend::notifications::{
    notification_channel, HttpMailer, LogMailer, Mailer, NotificationWorker,
};
use wealthbuilders_backend::plans::{default_plans, seed_plans};
use wealthbuilders_backend::store::{MemoryStore, PgStore, Store};
use wealthbuilders_backend::sweeper::spawn_maturity_sweeper;
use wealthbuilders_backend::{create_app, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    telemetry::init_tracing(config.log_format)?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections)
                .await
                .context("failed to connect to database")?;
            store.migrate().await.context("failed to run migrations")?;
            info!("Database connected and migrated");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, records are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let catalog = seed_plans(store.as_ref(), &default_plans())
        .await
        .context("failed to seed investment plans")?;

    let mailer: Arc<dyn Mailer> = match &config.mail_api_url {
        Some(url) => Arc::new(HttpMailer::new(
            url.as_str(),
            config.mail_api_key.clone(),
            config.mail_from.as_str(),
        )?),
        None => {
            warn!("MAIL_API_URL not set, emails are logged instead of sent");
            Arc::new(LogMailer)
        }
    };

    let shutdown = CancellationToken::new();
    let (notifier, notifications) = notification_channel(config.notification_queue_capacity);
    let worker = NotificationWorker::new(notifications, mailer, config.frontend_url.as_str())
        .spawn(shutdown.clone());

    let service = Arc::new(InvestmentService::new(
        store.clone(),
        Arc::new(catalog),
        notifier,
        Arc::new(SystemClock),
        config.admin_email.as_str(),
    ));

    let sweeper = config.maturity_sweep_interval_secs.map(|secs| {
        spawn_maturity_sweeper(service.clone(), Duration::from_secs(secs), shutdown.clone())
    });

    let app = create_app(AppState::new(service, store, &config.jwt_secret));
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    info!(port = config.port, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("server error")?;

    shutdown.cancel();
    if let Some(sweeper) = sweeper {
        sweeper.await.context("maturity sweeper panicked")?;
    }
    worker.await.context("notification worker panicked")?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
