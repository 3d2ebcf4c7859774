use std::sync::Arc;

use crate::assets::AssetPrefetcher;
use crate::binder::session::SessionRegistry;
use crate::catalog::RhymeCatalog;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Rhyme lookup. Default: PgRhymeCatalog.
    pub catalog: Arc<dyn RhymeCatalog>,
    /// Per-binder local selection lists and their background writers.
    pub sessions: Arc<SessionRegistry>,
    pub assets: Arc<AssetPrefetcher>,
}

#[cfg(test)]
impl AppState {
    /// State over in-memory collaborators with artwork prefetch disabled.
    pub fn for_tests(store: Arc<dyn crate::binder::store::SelectionStore>) -> Self {
        AppState {
            config: Config {
                database_url: "postgres://localhost/binder_test".to_string(),
                asset_base_url: None,
                prefetch_ahead: 2,
                session_idle: std::time::Duration::from_secs(1800),
                port: 0,
                rust_log: "debug".to_string(),
            },
            catalog: Arc::new(crate::catalog::StaticCatalog::nursery()),
            sessions: Arc::new(SessionRegistry::new(store)),
            assets: Arc::new(AssetPrefetcher::new(None)),
        }
    }
}
