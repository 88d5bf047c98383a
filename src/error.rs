//! Error types and HTTP error response handling.
//!
//! This module defines the errors surfaced by the store-facing layers and how
//! they are converted into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Connectivity Errors**: the store is unreachable or a pooled connection failed its liveness check
/// - **Constraint Errors**: a uniqueness constraint rejected a write
/// - **Resource Errors**: requested rows do not exist (or are soft-deleted)
/// - **Migration Errors**: a schema revision failed and was rolled back
/// - **Validation Errors**: invalid input handed to a service function
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// Never retried here; the caller decides what to do.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A unique constraint or index rejected the write.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Conflict on {constraint}")]
    Conflict { constraint: String },

    /// Requested row does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Applying or reverting a schema revision failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Input is invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Classify store errors so callers can tell a constraint breach from an outage.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return AppError::Conflict {
                    constraint: db_err.constraint().unwrap_or("unique").to_string(),
                };
            }
        }
        AppError::Database(err)
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `NotFound` → 404 Not Found
/// - `Conflict` → 409 Conflict
/// - `InvalidRequest` → 400 Bad Request
/// - `Database` → 503 Service Unavailable for pool/connectivity failures, 500 otherwise
/// - `Migration` → 500 Internal Server Error
///
/// Store and migration details are logged, never sent to the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::Conflict { .. } => (StatusCode::CONFLICT, "conflict", self.to_string()),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Database(ref err) if is_connectivity(err) => {
                tracing::error!(error = %err, "database unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "database_unavailable",
                    "The database is unavailable".to_string(),
                )
            }
            AppError::Database(ref err) => {
                tracing::error!(error = %err, "database error");
                internal_error()
            }
            AppError::Migration(ref err) => {
                tracing::error!(error = %err, "migration error");
                internal_error()
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

fn internal_error() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "An internal error occurred".to_string(),
    )
}

fn is_connectivity(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_sqlx_errors_stay_database_errors() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            AppError::NotFound("QR code").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict {
                constraint: "ix_users_email".into()
            }
            .into_response()
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InvalidRequest("bad".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Database(sqlx::Error::PoolTimedOut)
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound)
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(AppError::NotFound("API key").to_string(), "API key not found");
    }
}
