//! Axum route handlers for the Rhyme catalog.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::catalog::Rhyme;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RhymeListQuery {
    /// Only rhymes of this footprint (e.g. `0.5`, `1`, `3`).
    pub pages: Option<f64>,
}

/// GET /api/v1/rhymes
pub async fn handle_list_rhymes(
    State(state): State<AppState>,
    Query(query): Query<RhymeListQuery>,
) -> Result<Json<Vec<Rhyme>>, AppError> {
    let rhymes = state.catalog.list().await?;
    let rhymes = match query.pages {
        Some(pages) => rhymes
            .into_iter()
            .filter(|r| (r.pages - pages).abs() < f64::EPSILON)
            .collect(),
        None => rhymes,
    };
    Ok(Json(rhymes))
}

/// GET /api/v1/rhymes/:code/artwork
pub async fn handle_get_artwork(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !state.assets.is_enabled() {
        return Err(AppError::NotFound("Artwork serving is not configured".to_string()));
    }
    state
        .catalog
        .lookup(&code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Rhyme '{code}' not found")))?;

    let bytes = state.assets.get(&code).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}
