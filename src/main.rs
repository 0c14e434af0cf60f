mod args;
mod cache;
mod database;
mod disk;
mod entities;
mod error;
mod routes;
mod settings;
mod utils;
mod validation;

#[cfg(test)]
mod test;

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::args::parse_startup_args;
use crate::database::DatabaseManager;
use crate::disk::logs_dir;
use crate::utils::{AppState, LOG_FILE_NAME};

const DEFAULT_LOG_FILTER: &str = "dashboard_settings=info,tower_http=info";

fn init_logging(storage_dir: &Path) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(logs_dir(storage_dir)?, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_startup_args()?;

    // the guard flushes buffered log lines when main returns
    let _log_guard = init_logging(&args.storage_dir_path)?;
    tracing::debug!("{:?}", args);

    let db = DatabaseManager::connect(&args.database_url, args.max_connections, args.cache_ttl)
        .await?;
    if args.import_legacy_file {
        db.migrate_settings_from_file(&args.storage_dir_path).await?;
    }

    let state = Arc::new(AppState {
        store: Arc::new(db),
        user_id: args.user_id,
        storage_dir: args.storage_dir_path,
        database_url_configured: args.database_url_configured,
        mirror_legacy_file: args.mirror_legacy_file,
        mirror_lock: Default::default(),
    });
    let router = routes::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.daemon_listening_port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down gracefully"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down gracefully"),
    }
}
