use crate::{
    models::file_collection::CollectionError,
    services::{
        auth_service::AuthError, deposit_service::DepositError, storage_service::StorageError,
    },
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 401 Unauthorized (no usable credential)
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    /// Shortcut for 403 Forbidden (credential present but insufficient)
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
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
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), "{}", self.message);
        }

        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<CollectionError> for AppError {
    fn from(err: CollectionError) -> Self {
        let status = match err {
            CollectionError::KeyNotFound(_) => StatusCode::NOT_FOUND,
            CollectionError::KeyExists(_) => StatusCode::CONFLICT,
            CollectionError::EmptyKey | CollectionError::InvalidOrder(_) => {
                StatusCode::BAD_REQUEST
            }
        };
        AppError::new(status, err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::BucketNotFound(_) | StorageError::FileNotFound(_) => {
                AppError::not_found(err.to_string())
            }
            StorageError::Sqlx(_) | StorageError::Io(_) => AppError::internal(err.to_string()),
        }
    }
}

impl From<DepositError> for AppError {
    fn from(err: DepositError) -> Self {
        match err {
            DepositError::NotFound(_) | DepositError::BucketNotFound(_) => {
                AppError::not_found(err.to_string())
            }
            DepositError::Conflict(_) => AppError::new(StatusCode::CONFLICT, err.to_string()),
            DepositError::Storage(inner) => inner.into(),
            DepositError::Collection(_)
            | DepositError::InvalidStatus(_)
            | DepositError::Sqlx(_) => AppError::internal(err.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::unauthorized(err.to_string()),
            AuthError::UserExists(_) => AppError::new(StatusCode::CONFLICT, err.to_string()),
            AuthError::Hash(_) | AuthError::Sqlx(_) => AppError::internal(err.to_string()),
        }
    }
}
