mod config;
mod db;
mod frame;
mod routes;
mod services;
mod state;
mod store;

use std::sync::Arc;

use config::{Config, StoreBackend};
use store::{MemoryDeviceStore, PgDeviceStore, RecordStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "presence exited");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is normal outside local development.
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    let store: Arc<dyn RecordStore> = match &config.store {
        StoreBackend::Postgres { database_url } => {
            let pool = db::init_pool(database_url, config.db_max_connections).await?;
            tracing::info!(max_connections = config.db_max_connections, "postgres device store ready");
            Arc::new(PgDeviceStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory device store; presence is not shared across instances");
            Arc::new(MemoryDeviceStore::new())
        }
    };

    let port = config.port;
    let reset_on_startup = config.reset_on_startup;
    let state = state::AppState::new(store, config);

    // No socket survives a restart, so nothing can still be online.
    if reset_on_startup {
        state.presence.reset_all().await?;
    }

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "presence listening");
    axum::serve(listener, app).await?;
    Ok(())
}
