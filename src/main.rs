//! Wallet Session - value transfers recorded on a Transactions contract
//!
//! Connects to a wallet provider, keeps a transaction draft, submits transfers
//! together with their on-chain record and serves the session to a UI over HTTP.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

mod api;
mod config;
mod contract;
mod error;
mod history;
mod metrics;
mod session;
mod storage;
mod wallet;

use config::Settings;
use metrics::MetricsServer;
use session::TransactionSession;
use storage::{FileStore, LocalStore, MemoryStore};
use wallet::WalletHandle;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Wallet Session v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;

    let store: Arc<dyn LocalStore> = match &settings.session.storage_path {
        Some(path) => {
            info!("Session storage at {}", path);
            Arc::new(FileStore::new(path))
        }
        None => Arc::new(MemoryStore::new()),
    };

    let handle = WalletHandle::from_settings(&settings)?;
    if handle.is_none() {
        warn!("Running without a wallet provider");
    }

    let session = Arc::new(
        TransactionSession::new(handle, store, settings.timestamp_format()?).await,
    );

    // Pick up an account the wallet already authorized
    if let Err(e) = session.check_existing_authorization().await {
        warn!("Initial wallet check failed: {}", e);
    }
    if session.current_account().await.is_none() {
        info!("No account authorized yet - POST /connect to request one");
    }

    // Log pending/idle transitions
    let loading_handle = tokio::spawn({
        let mut pending = session.pending_updates();
        async move {
            while pending.changed().await.is_ok() {
                match *pending.borrow_and_update() {
                    0 => info!("Idle"),
                    n => info!("Awaiting confirmation of {} submission(s)...", n),
                }
            }
        }
    });

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let session = session.clone();
        async move {
            if let Err(e) = api::run_server(config, session).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Wallet Session is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    api_handle.abort();
    loading_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Wallet Session stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,wallet_session=debug,hyper=warn,tower_http=info")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
