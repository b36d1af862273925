//! Error types for the HTTP layer.

use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::imaging::ImageError;
use crate::storage::StoreError;
use crate::StorefrontError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] StorefrontError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("Invalid request body: {}", .0.body_text())]
    Payload(#[from] JsonRejection),

    #[error("Invalid form: {0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Domain(_) | ApiError::Payload(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Image(ImageError::Io(_) | ImageError::Encode(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Image(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::AlreadyExists { .. }) => StatusCode::CONFLICT,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, %status, "Request rejected");
        }

        let body = Json(serde_json::json!({ "error": self.to_string() }));
        if matches!(self, ApiError::Unauthorized) {
            return (status, [(header::WWW_AUTHENTICATE, "Basic realm=\"admin\"")], body).into_response();
        }
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
