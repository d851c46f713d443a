use std::sync::Arc;

use anyhow::{Context, Result};
use movie_search::api;
use movie_search::config::AppConfig;
use movie_search::{SearchService, SqliteRecordSource};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .pretty()
        .init();

    let config = AppConfig::from_env()?;
    info!(
        database = %config.database_path.display(),
        snapshot = %config.snapshot_path.display(),
        bind_addr = %config.bind_addr,
        limit = config.result_limit,
        max_edits = config.max_edits,
        "loaded configuration"
    );

    let source = Arc::new(SqliteRecordSource::new(&config.database_path));
    let search = Arc::new(SearchService::new(
        source,
        &config.snapshot_path,
        config.search_options(),
    ));
    search
        .ensure_ready()
        .await
        .context("initializing search index")?;

    let app = api::router(api::AppState::new(search));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "starting http server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
