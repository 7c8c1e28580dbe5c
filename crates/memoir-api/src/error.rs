use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use memoir_imagestore::ImageStoreError;

/// Error taxonomy for every service operation. Each variant maps to one
/// HTTP status at the boundary; 500s never expose their detail to clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),
    /// Bad email/password combination. Deliberately does not say which.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Conflict on a unique field.
    #[error("{0}")]
    Duplicate(String),
    /// Missing, invalid, or expired session. One message for every cause:
    /// a tampered token and a deleted account must look identical.
    #[error("Unauthorized")]
    Unauthenticated,
    /// Valid session, but the resource belongs to someone else.
    #[error("Unauthorized")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    /// External image store failure.
    #[error(transparent)]
    Dependency(#[from] ImageStoreError),
    /// Database or other internal failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidCredentials | ApiError::Duplicate(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Dependency(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            ApiError::Dependency(e) => {
                error!("image store failure: {}", e);
                "Internal Server Error".to_string()
            }
            ApiError::Internal(e) => {
                error!("internal error: {:#}", e);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        let body = match &self {
            // check-auth clients key off `valid` in 401 bodies.
            ApiError::Unauthenticated => json!({ "valid": false, "message": message }),
            _ => json!({ "message": message }),
        };

        (status, Json(body)).into_response()
    }
}
