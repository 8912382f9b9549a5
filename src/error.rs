//! Error types for the practitioner lookup and the HTTP boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Message returned to clients for any failure we do not recover from.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Sorry, something went wrong while preparing a reply. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("practitioner lookup transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("practitioner lookup returned HTTP {0}")]
    Status(u16),
    #[error("failed to decode practitioner lookup response: {0}")]
    Decode(String),
    #[error("practitioner lookup failed: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Resolver(e) => {
                tracing::error!(error = %e, "chat turn failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": GENERIC_FAILURE_MESSAGE })),
                )
                    .into_response()
            }
        }
    }
}
