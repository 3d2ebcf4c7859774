mod assets;
mod binder;
mod catalog;
mod config;
mod db;
mod errors;
mod layout;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::assets::AssetPrefetcher;
use crate::binder::session::SessionRegistry;
use crate::binder::store::PgSelectionStore;
use crate::catalog::PgRhymeCatalog;
use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Binder API v{}", env!("CARGO_PKG_VERSION"));
    info!("Binder capacity: {} pages", layout::MAX_PAGES);

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Artwork prefetch is optional
    let assets = Arc::new(AssetPrefetcher::new(config.asset_base_url.clone()));
    match &config.asset_base_url {
        Some(url) => info!(
            "Artwork prefetch enabled from {url} ({} pages ahead)",
            config.prefetch_ahead
        ),
        None => info!("Artwork prefetch disabled (ASSET_BASE_URL not set)"),
    }

    let sessions = Arc::new(SessionRegistry::new(Arc::new(PgSelectionStore::new(db.clone()))));
    spawn_session_sweeper(Arc::clone(&sessions), config.session_idle);

    // Build app state
    let state = AppState {
        config: config.clone(),
        catalog: Arc::new(PgRhymeCatalog::new(db)),
        sessions,
        assets,
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict CORS to the school portal origin
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drops binder sessions idle for longer than `idle_for`.
fn spawn_session_sweeper(sessions: Arc<SessionRegistry>, idle_for: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval((idle_for / 4).max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle(idle_for).await;
            if evicted > 0 {
                info!("Evicted {evicted} idle binder session(s)");
            }
        }
    });
}
