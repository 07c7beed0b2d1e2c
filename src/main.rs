//! curatord: the catalog server binary.

use curator_core::catalog::engine::CatalogEngine;
use curator_core::ipc::dispatch::Dispatcher;
use curator_core::ipc::server::Server;
use curator_core::metrics::Metrics;
use curator_core::observability::init_tracing;
use curator_core::registry::ToolRegistry;
use curator_core::store::ContentStore;
use curator_core::types::Config;
use curator_core::validation;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    init_tracing();
    let config = Config::from_env();
    info!(
        store_dir = %config.catalog.store_dir.display(),
        mutation_enabled = config.catalog.mutation_enabled,
        backend = ?config.catalog.validation_backend,
        "starting curatord"
    );

    if let Err(e) = run(config).await {
        error!(error = %e, "fatal");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> curator_core::types::Result<()> {
    let store = ContentStore::open(&config.catalog.store_dir)?;
    let engine = Arc::new(Mutex::new(CatalogEngine::new(
        store,
        config.catalog.clone(),
    )?));
    let registry = Arc::new(ToolRegistry::standard());
    let validator = validation::build(config.catalog.validation_backend);
    let metrics = Arc::new(Metrics::new());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&engine),
        Arc::clone(&registry),
        validator,
        Arc::clone(&metrics),
    ));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    let server = Server::new(config, engine, dispatcher, metrics);
    server.run(shutdown).await
}
