use std::sync::Arc;

use datashare_api::config::AppConfig;
use datashare_api::database::DatabaseManager;
use datashare_api::storage::LocalFileStore;
use datashare_api::{app, AppState};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "datashare_api=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    let config = AppConfig::from_env();
    config.validate()?;
    tracing::info!("Starting Datashare API in {:?} mode", config.environment);
    if config.uses_development_secret() {
        tracing::warn!("JWT_SECRET not set; using the development secret");
    }

    let pool = DatabaseManager::connect(&config.database).await?;
    if config.database.run_migrations {
        DatabaseManager::migrate(&pool).await?;
    }

    let datasets = LocalFileStore::open(&config.storage.dataset_dir).await?;
    let pictures = LocalFileStore::open(&config.storage.picture_dir).await?;
    tracing::info!(
        "Storing datasets in {} and pictures in {}",
        datasets.root().display(),
        pictures.root().display()
    );

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let state = AppState::new(config, pool, Arc::new(datasets), Arc::new(pictures));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Datashare API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
