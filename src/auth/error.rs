use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::store::StoreError;

/// Domain failures surfaced by the auth state machine. Display strings are
/// the externally visible messages; enumeration-sensitive cases deliberately
/// share one generic phrasing.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("User already exists")]
    EmailTaken,
    #[error("User not found")]
    NotFound,
    #[error("Invalid email or OTP")]
    InvalidCredentialOrOtp,
    #[error("OTP expired")]
    OtpExpired,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Email not verified")]
    NotVerified,
    #[error("Failed to send OTP")]
    NotifyFailed,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Server error")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AuthError::EmailTaken,
            other => AuthError::Internal(other.into()),
        }
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_)
            | AuthError::InvalidCredentialOrOtp
            | AuthError::OtpExpired => StatusCode::BAD_REQUEST,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidCredentials | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::NotVerified => StatusCode::FORBIDDEN,
            AuthError::NotifyFailed | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::Internal(e) => error!(error = ?e, "internal error"),
            other => warn!(error = %other, "auth request rejected"),
        }
        let body = ErrorBody {
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_error_hides_its_source() {
        let err = AuthError::Internal(anyhow::anyhow!("pg: connection refused to 10.0.0.5"));
        assert_eq!(err.to_string(), "Server error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn duplicate_email_maps_to_conflict() {
        let err = AuthError::from(StoreError::DuplicateEmail);
        assert!(matches!(err, AuthError::EmailTaken));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn enumeration_sensitive_failures_share_a_message() {
        assert_eq!(
            AuthError::InvalidCredentialOrOtp.to_string(),
            "Invalid email or OTP"
        );
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Invalid credentials");
    }
}
