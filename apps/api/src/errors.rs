use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::layout::LayoutError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Asset fetch error: {0}")]
    Asset(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Layout(e) => {
                let (status, code) = match e {
                    LayoutError::CapacityExceeded { .. } => {
                        (StatusCode::CONFLICT, "CAPACITY_EXCEEDED")
                    }
                    LayoutError::NoSwapPossible { .. } => {
                        (StatusCode::CONFLICT, "NO_SWAP_POSSIBLE")
                    }
                    LayoutError::MalformedSelection { .. } => {
                        (StatusCode::BAD_REQUEST, "MALFORMED_SELECTION")
                    }
                    LayoutError::ContinuationPage { .. } => {
                        (StatusCode::CONFLICT, "CONTINUATION_PAGE")
                    }
                };
                (status, code, e.to_string())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Persistence(msg) => {
                tracing::error!("Persistence error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "PERSISTENCE_ERROR",
                    "The selection store could not be reached".to_string(),
                )
            }
            AppError::Asset(msg) => {
                tracing::warn!("Asset fetch error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "ASSET_ERROR",
                    "Rhyme artwork is unavailable".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
