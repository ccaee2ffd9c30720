pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use services::dataset_store::DatasetStore;

// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub store: Arc<DatasetStore>,
}

impl AppState {
    pub fn new(config: config::Config, store: DatasetStore) -> Self {
        Self {
            config,
            store: Arc::new(store),
        }
    }
}
