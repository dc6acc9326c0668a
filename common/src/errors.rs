//! Application error types.
//!
//! Every failure of a lookup request ends up as one `AppError`. Client input
//! errors carry a fixed, human-readable body; storage and unexpected errors
//! keep their detail for the server log and answer with a generic body.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Body returned for every 5xx response.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred while processing the request.";

/// Application errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    // ==================
    // Client input (4xx)
    // ==================
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Invalid request path.")]
    InvalidPath,

    #[error("The table parameter for 'table' is missing.")]
    MissingTable,

    #[error("Invalid table name.")]
    InvalidTable,

    #[error("Invalid fuzzy name.")]
    InvalidFuzzy,

    #[error("Invalid column name.")]
    InvalidColumn,

    #[error("Invalid search name.")]
    InvalidSearch,

    // ==================
    // Storage (5xx)
    // ==================
    /// The data store rejected or failed the statement.
    #[error("database query failed: {0}")]
    DatabaseQuery(String),

    /// The data store could not be reached.
    #[error("database connection failed: {0}")]
    DatabaseConnection(String),

    // ==================
    // Everything else (5xx)
    // ==================
    /// Invalid deployment configuration (startup only).
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::MissingTable => StatusCode::BAD_REQUEST,
            AppError::InvalidPath
            | AppError::InvalidTable
            | AppError::InvalidFuzzy
            | AppError::InvalidColumn
            | AppError::InvalidSearch => StatusCode::FORBIDDEN,
            AppError::DatabaseQuery(_)
            | AppError::DatabaseConnection(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error comes from the caller's input.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// The body sent to the caller. Server-side detail never leaves the process.
    pub fn public_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            GENERIC_ERROR_MESSAGE.to_string()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, self.public_message()).into_response();
        if status == StatusCode::METHOD_NOT_ALLOWED {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::MethodNotAllowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(AppError::MissingTable.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidTable.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::InvalidSearch.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::DatabaseQuery("no such table".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_storage_detail_is_not_public() {
        let err = AppError::DatabaseQuery("no such table: secret_internal".into());
        assert_eq!(err.public_message(), GENERIC_ERROR_MESSAGE);
        assert!(err.to_string().contains("secret_internal"));
    }

    #[test]
    fn test_method_not_allowed_sets_allow_header() {
        let response = AppError::MethodNotAllowed.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET");
    }
}
