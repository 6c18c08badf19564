//! # CompanySync API Server
//!
//! Loads configuration from the environment, migrates the database, and
//! serves the HTTP API until interrupted.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/companysync cargo run -p companysync-api
//! ```

use companysync_api::{
    app::{build_router, AppState},
    config::{Config, LogFormat},
};
use companysync_shared::{
    db::{
        migrations::{ensure_database_exists, run_migrations},
        pool::{close_pool, create_pool},
    },
    storage::local::LocalDiskStore,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "companysync_api=debug,companysync_shared=info,tower_http=info";

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    tracing::info!(
        "CompanySync API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    ensure_database_exists(&config.database.url).await?;
    let pool = create_pool(config.pool_config()).await?;
    run_migrations(&pool).await?;

    let storage = LocalDiskStore::new(&config.uploads.dir, &config.uploads.public_path);
    storage.ensure_root().await?;

    let addr = config.bind_address();
    let state = AppState::with_storage(pool.clone(), config, Arc::new(storage));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
