// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use federated_mint::{
    api::router,
    config::{ConfigError, MintConfig, LOG_FORMAT_ENV},
    logging::{init_logging, LogFormat},
    network::Network,
    propagation::{
        propagation_queue, HttpCanonicalSource, PropagationCoordinator, PropagationWorker,
    },
    state::AppState,
    storage::{BalanceBackend, MemoryBackend, MintDatabase, StorageError},
};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("peer client: {0}")]
    PeerClient(#[from] reqwest::Error),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let format = std::env::var(LOG_FORMAT_ENV)
        .map(|f| LogFormat::from_str_lossy(&f))
        .unwrap_or_default();
    init_logging(format);

    if let Err(e) = run().await {
        error!(error = %e, "Mint failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Arc::new(MintConfig::from_env()?);

    let backend: Arc<dyn BalanceBackend> = match config.database_path() {
        Some(path) => {
            info!(path = %path.display(), "Opening mint database");
            Arc::new(MintDatabase::open(&path)?)
        }
        None => {
            warn!("DATA_DIR not set, balances are kept in memory only");
            Arc::new(MemoryBackend::new())
        }
    };

    let shutdown = CancellationToken::new();
    let (handle, queue) = propagation_queue(config.propagation_queue);
    let source = HttpCanonicalSource::new(config.peers.clone())?;
    let coordinator = PropagationCoordinator::new(source, backend.clone(), config.clone());
    let worker = tokio::spawn(PropagationWorker::new(coordinator, queue).run(shutdown.clone()));

    let state = AppState::new(config.clone(), backend, handle, shutdown.clone());
    let app = router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        %addr,
        test_mint = %config.network(Network::Test).address(),
        live_mint = %config.network(Network::Live).address(),
        "Mint listening (docs at /docs)"
    );

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = worker.await {
        warn!(error = %e, "Propagation worker ended abnormally");
    }
    info!("Mint stopped");
    Ok(())
}
