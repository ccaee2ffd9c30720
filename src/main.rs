use anyhow::Result;
use std::sync::Arc;

use dashboard_services::{config, logging, routes, services::dataset_store::DatasetStore, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::Config::from_env()?;
    let store = DatasetStore::open(&config.database_path)?;
    let addr = config.bind_addr;

    // Build our application state
    let state = Arc::new(AppState::new(config, store));
    let app = routes::router(state);

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
