use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String, // stored trimmed + lowercased
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub name: Option<String>,
    pub password_version: i32, // bumped on password reset, embedded in tokens
    pub is_verified: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// One-time passcode record. The plaintext code is never stored; `code_hash`
/// holds its Argon2 hash. Once `used` flips true it never reverts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OtpRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub code_hash: String,
    pub expires_at: OffsetDateTime,
    pub used: bool,
    pub created_at: OffsetDateTime,
}
