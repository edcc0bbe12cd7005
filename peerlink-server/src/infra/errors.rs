use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use peerlink_config::ConfigStoreError;
use peerlink_core::{AddressError, MergeError};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<AddressError> for AppError {
    fn from(err: AddressError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<ConfigStoreError> for AppError {
    fn from(err: ConfigStoreError) -> Self {
        match err {
            ConfigStoreError::DuplicatePeer(_) => Self::conflict(err.to_string()),
            ConfigStoreError::PeerNotFound(_) => Self::not_found(err.to_string()),
            ConfigStoreError::Address(inner) => inner.into(),
            ConfigStoreError::Persist { .. } => {
                tracing::error!(error = ?err, "failed to persist federation settings");
                Self::internal("Failed to persist federation settings")
            }
        }
    }
}

impl From<MergeError> for AppError {
    fn from(err: MergeError) -> Self {
        tracing::warn!(error = %err, "merge request could not run");
        Self::service_unavailable(err.to_string())
    }
}
