pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::binder::handlers;
use crate::catalog::handlers as catalog;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Catalog
        .route("/api/v1/rhymes", get(catalog::handle_list_rhymes))
        .route(
            "/api/v1/rhymes/:code/artwork",
            get(catalog::handle_get_artwork),
        )
        // Stateless layout planning
        .route("/api/v1/layout/plan", post(handlers::handle_plan_preview))
        // Binder sessions
        .route(
            "/api/v1/binders/:school_id/:grade",
            get(handlers::handle_get_binder),
        )
        .route(
            "/api/v1/binders/:school_id/:grade/selections",
            post(handlers::handle_add_selection),
        )
        .route(
            "/api/v1/binders/:school_id/:grade/pages/:page_index",
            get(handlers::handle_get_page).delete(handlers::handle_remove_selection),
        )
        .route(
            "/api/v1/binders/:school_id/:grade/pages/:page_index/swap",
            post(handlers::handle_swap_halves),
        )
        .route(
            "/api/v1/binders/:school_id/:grade/refresh",
            post(handlers::handle_refresh),
        )
        .route(
            "/api/v1/binders/:school_id/:grade/notices",
            get(handlers::handle_drain_notices),
        )
        .with_state(state)
}
