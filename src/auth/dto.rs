use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// Request body for OTP verification.
#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

/// Request body for resending an OTP.
#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub email: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for requesting a password-reset OTP.
#[derive(Debug, Deserialize)]
pub struct RequestPasswordResetRequest {
    pub email: String,
}

/// Request body for resetting the password with an OTP.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

/// Request body for updating the profile name.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub is_verified: bool,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            is_verified: user.is_verified,
        }
    }
}

/// Response returned after registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: PublicUser,
    pub user_id: Uuid,
    pub message: String,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Generic acknowledgement body.
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
    pub message: String,
}

impl OkResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn public_user_never_serializes_password_hash() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            name: Some("Test".into()),
            password_version: 1,
            is_verified: false,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&PublicUser::from(&user)).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("argon2"));

        // The entity itself also skips the hash when serialized.
        let entity_json = serde_json::to_string(&user).unwrap();
        assert!(!entity_json.contains("argon2"));
    }
}
