//! Service error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Result type for service operations
pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Validation error: {0}")]
    Validation(#[from] lifepulse_core::Error),

    #[error("Donor not found")]
    DonorNotFound,

    #[error("Blood request not found")]
    RequestNotFound,

    #[error("Notification not found")]
    NotificationNotFound,

    #[error("No pending verification code for this email")]
    OtpNotFound,

    #[error("Verification code expired")]
    OtpExpired,

    #[error("Too many failed attempts, request a new verification code")]
    TooManyAttempts,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Email already registered and approved")]
    EmailAlreadyRegistered,

    #[error("This email has been rejected previously")]
    AccountRejected,

    #[error("Donor status cannot change from {from} to {to}")]
    InvalidTransition {
        from: lifepulse_core::DonorStatus,
        to: lifepulse_core::DonorStatus,
    },

    #[error("Blood request is closed")]
    RequestClosed,

    #[error("Missing or invalid caller identity")]
    MissingIdentity,

    #[error("Dependency failure: {0}")]
    Dependency(String),
}

impl ServerError {
    pub fn dependency(err: impl std::fmt::Display) -> Self {
        ServerError::Dependency(err.to_string())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::DonorNotFound
            | ServerError::RequestNotFound
            | ServerError::NotificationNotFound => StatusCode::NOT_FOUND,
            ServerError::OtpNotFound | ServerError::OtpExpired | ServerError::InvalidCode => {
                StatusCode::BAD_REQUEST
            }
            ServerError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            ServerError::EmailAlreadyRegistered => StatusCode::CONFLICT,
            ServerError::AccountRejected => StatusCode::FORBIDDEN,
            ServerError::InvalidTransition { .. } | ServerError::RequestClosed => {
                StatusCode::CONFLICT
            }
            ServerError::MissingIdentity => StatusCode::UNAUTHORIZED,
            ServerError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let reason = match &self {
            ServerError::Dependency(msg) => {
                tracing::error!("Dependency failure: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({ "success": false, "reason": reason });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_failures_are_distinguishable() {
        assert_eq!(ServerError::OtpNotFound.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ServerError::OtpExpired.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ServerError::InvalidCode.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServerError::TooManyAttempts.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_ne!(
            ServerError::OtpExpired.to_string(),
            ServerError::InvalidCode.to_string()
        );
    }

    #[test]
    fn test_validation_wraps_core_error() {
        let err: ServerError = lifepulse_core::Error::InvalidRadius(-1.0).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("-1"));
    }
}
