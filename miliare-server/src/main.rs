//! Miliare referral network service

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use miliare_server::{
    routes, AppState, Config, ConsoleNotifier, DataStore, InMemoryDataStore,
    InMemorySessionStore, Notifier, SessionStore, SqliteStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "miliare_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(?config, "Loaded configuration");

    match config.database.clone() {
        Some(path) => {
            let store = Arc::new(SqliteStore::open(&path)?);
            tracing::info!(path = %path, "Using SQLite store");
            let state = AppState::with_shared_stores(
                store.clone(),
                store,
                ConsoleNotifier::new(),
                config,
            );
            serve(Arc::new(state)).await
        }
        None => {
            tracing::warn!("MILIARE_DATABASE not set, data will not survive a restart");
            let state = AppState::new(
                InMemoryDataStore::new(),
                InMemorySessionStore::new(),
                ConsoleNotifier::new(),
                config,
            );
            serve(Arc::new(state)).await
        }
    }
}

async fn serve<D, S, N>(state: Arc<AppState<D, S, N>>) -> Result<()>
where
    D: DataStore + 'static,
    S: SessionStore + 'static,
    N: Notifier + 'static,
{
    let addr = format!("0.0.0.0:{}", state.config.port);
    let app = routes::create_router(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Miliare listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
