//! HTTP front end for whois-sweep.
//!
//! Serves batch resolution, progress polling and the saved-domain list.
//! Configured from the same config files and `WS_*` variables as the CLI;
//! `WS_BIND` sets the listen address (default `127.0.0.1:3000`).

mod routes;
mod store;

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use whois_sweep_lib::{
    load_env_config, validate_config, BatchScheduler, ConfigManager, ResolveConfig, Resolver,
};

const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() {
    // Logs go to stderr; default level is info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let env_config = load_env_config();
    let file_config = ConfigManager::new(false).load(env_config.config.as_deref().map(Path::new))?;

    let config = env_config.apply_to(file_config.apply_to(ResolveConfig::default()));
    validate_config(&config)?;

    let resolver = Arc::new(Resolver::with_config(config)?);
    info!(
        providers = ?resolver.provider_names(),
        suffixes = resolver.registry().len(),
        "resolver ready"
    );

    let state = routes::AppState::new(
        BatchScheduler::new(resolver),
        Arc::new(store::MemoryStore::new()),
    );

    let bind = std::env::var("WS_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
