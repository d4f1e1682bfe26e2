use std::process;
use std::sync::Arc;

use log::{error, info};

mod auth;
mod core;
mod models;
mod services;
mod web;

use crate::core::config::AppConfig;
use crate::core::store::{DocumentStore, SqliteDocumentStore};
use crate::web::server::{start_web_server, AppState};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    info!("Starting Blog CMS API v{}...", env!("CARGO_PKG_VERSION"));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let store: Arc<dyn DocumentStore> = match SqliteDocumentStore::open(&config.database_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Could not open document store at {}: {}", config.database_path, e);
            process::exit(1);
        }
    };

    let state = actix_web::web::Data::new(AppState::new(config, store));

    // The server stops itself on Ctrl+C
    if let Err(e) = start_web_server(state).await {
        error!("Web server error: {}", e);
        process::exit(1);
    }

    info!("Blog CMS API shutdown complete");
}
