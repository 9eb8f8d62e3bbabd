//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::PasswordError;
use crate::domain::DomainError;
use crate::mailer::MailerError;
use crate::notification::NotificationError;
use crate::repository::RepositoryError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Version conflict: concurrent modification detected")]
    VersionConflict,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error(transparent)]
    Mail(#[from] MailerError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        RepositoryError::from(err).into()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ConcurrencyConflict { .. } => AppError::VersionConflict,
            RepositoryError::UniqueViolation(constraint) => AppError::Conflict(conflict_subject(&constraint)),
            RepositoryError::Database(e) => AppError::Database(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound(id) => AppError::NotFound(format!("Notification {}", id)),
            NotificationError::Domain(e) => AppError::Domain(e),
            NotificationError::Repository(e) => e.into(),
        }
    }
}

/// Human-readable subject for a unique constraint name
fn conflict_subject(constraint: &str) -> String {
    match constraint {
        "users_email_key" => "email already registered".to_string(),
        "users_user_name_key" => "user name already taken".to_string(),
        "currencies_name_key" => "currency already exists".to_string(),
        other => format!("duplicate value ({})", other),
    }
}

/// Error response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub message: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn domain_status(err: &DomainError) -> (StatusCode, &'static str, Option<String>) {
    match err {
        DomainError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials", None),
        DomainError::InvalidOrExpiredOtp => (StatusCode::UNAUTHORIZED, "invalid_or_expired_otp", None),
        DomainError::InvalidPassword => (StatusCode::UNAUTHORIZED, "invalid_password", None),
        DomainError::InvalidOrExpiredToken => (StatusCode::BAD_REQUEST, "invalid_or_expired_token", None),
        DomainError::InsufficientBalance { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_state", Some("insufficient_balance".to_string()))
        }
        DomainError::CreditLimitExceeded { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_state", Some("credit_limit_exceeded".to_string()))
        }
        DomainError::TransactionCompleted(_) => {
            (StatusCode::BAD_REQUEST, "invalid_state", Some("transaction_completed".to_string()))
        }
        DomainError::IllegalStatusTransition { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_state", Some("illegal_status_transition".to_string()))
        }
        DomainError::InvalidTransactionType { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_state", Some("invalid_transaction_type".to_string()))
        }
        DomainError::LoanAlreadyPaid => {
            (StatusCode::BAD_REQUEST, "invalid_state", Some("loan_already_paid".to_string()))
        }
        DomainError::TransfersDisabled => (StatusCode::FORBIDDEN, "transfers_disabled", None),
        DomainError::InvalidAmount(msg) => (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone())),
        DomainError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone())),
        DomainError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),
        DomainError::VersionConflict { expected, found } => (
            StatusCode::CONFLICT,
            "version_conflict",
            Some(format!("expected {}, found {}", expected, found)),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone())),

            // 401 Unauthorized
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized", None),

            // 403 Forbidden
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),

            // 404 Not Found
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),

            // 409 Conflict
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict", None),
            AppError::VersionConflict => (StatusCode::CONFLICT, "version_conflict", None),

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => domain_status(domain_err),

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Mail(e) => {
                tracing::error!("Mail error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "mail_error", None)
            }
            AppError::Password(e) => {
                tracing::error!("Password hashing error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            status_code: status.as_u16(),
            message,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_state_group() {
        let (status, body) =
            body_of(DomainError::insufficient_balance(dec!(10), dec!(5)).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["errorCode"], "invalid_state");
        assert_eq!(body["details"], "insufficient_balance");

        let (status, _) = body_of(DomainError::TransactionCompleted("deleted").into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_authentication_errors_are_401() {
        for err in [
            DomainError::InvalidCredentials,
            DomainError::InvalidOrExpiredOtp,
            DomainError::InvalidPassword,
        ] {
            let (status, _) = body_of(err.into()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let (status, _) = body_of(DomainError::InvalidOrExpiredToken.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let (status, body) = body_of(AppError::Internal("secret stack trace".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_repository_conflicts_map_to_409() {
        let conflict: AppError = RepositoryError::UniqueViolation("users_email_key".to_string()).into();
        let (status, body) = body_of(conflict).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Conflict: email already registered");

        let version: AppError = RepositoryError::ConcurrencyConflict {
            aggregate_type: "Loan",
            aggregate_id: uuid::Uuid::nil(),
            expected: 1,
        }
        .into();
        let (status, body) = body_of(version).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["errorCode"], "version_conflict");
    }

    #[tokio::test]
    async fn test_forbidden_and_not_found() {
        let (status, _) = body_of(DomainError::forbidden("admin role required").into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = body_of(AppError::not_found("Loan")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Loan not found");
    }
}
