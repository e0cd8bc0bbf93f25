use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{OtpRecord, User};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The unique constraint on `users.email` fired. Kept distinguishable so
    /// the caller can map it to a domain-level "already exists" decision
    /// instead of relying on a racy read-then-write check alone.
    #[error("email already registered")]
    DuplicateEmail,
    #[error("storage error")]
    Database(#[from] sqlx::Error),
}

/// Persistence boundary for users and OTP records.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<User, StoreError>;
    /// Persist the mutable fields of an existing user (name, verification
    /// flag, password hash and version) and touch `updated_at`.
    async fn save_user(&self, user: &User) -> Result<(), StoreError>;

    async fn insert_otp(
        &self,
        user_id: Uuid,
        code_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<OtpRecord, StoreError>;
    /// Most recently created unused OTP record for the user, if any.
    async fn latest_unused_otp(&self, user_id: Uuid) -> Result<Option<OtpRecord>, StoreError>;
    /// Flip `used` on every unused record for the user.
    async fn invalidate_unused_otps(&self, user_id: Uuid) -> Result<(), StoreError>;
    async fn mark_otp_used(&self, otp_id: Uuid) -> Result<(), StoreError>;
}

/// In-memory store backing unit tests and `AppState::fake()`.
#[derive(Default)]
pub struct MemStore {
    users: Mutex<Vec<User>>,
    otps: Mutex<Vec<OtpRecord>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_users(&self) -> std::sync::MutexGuard<'_, Vec<User>> {
        self.users.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_otps(&self) -> std::sync::MutexGuard<'_, Vec<OtpRecord>> {
        self.otps.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl AuthStore for MemStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock_users().iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock_users().iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<User, StoreError> {
        let mut users = self.lock_users();
        if users.iter().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: name.map(str::to_string),
            password_version: 1,
            is_verified: false,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.lock_users();
        if let Some(existing) = users.iter_mut().find(|u| u.id == user.id) {
            existing.name = user.name.clone();
            existing.password_hash = user.password_hash.clone();
            existing.password_version = user.password_version;
            existing.is_verified = user.is_verified;
            existing.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn insert_otp(
        &self,
        user_id: Uuid,
        code_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<OtpRecord, StoreError> {
        let record = OtpRecord {
            id: Uuid::new_v4(),
            user_id,
            code_hash: code_hash.to_string(),
            expires_at,
            used: false,
            created_at: OffsetDateTime::now_utc(),
        };
        self.lock_otps().push(record.clone());
        Ok(record)
    }

    async fn latest_unused_otp(&self, user_id: Uuid) -> Result<Option<OtpRecord>, StoreError> {
        // Insertion order stands in for created_at ordering.
        Ok(self
            .lock_otps()
            .iter()
            .rev()
            .find(|o| o.user_id == user_id && !o.used)
            .cloned())
    }

    async fn invalidate_unused_otps(&self, user_id: Uuid) -> Result<(), StoreError> {
        for otp in self
            .lock_otps()
            .iter_mut()
            .filter(|o| o.user_id == user_id && !o.used)
        {
            otp.used = true;
        }
        Ok(())
    }

    async fn mark_otp_used(&self, otp_id: Uuid) -> Result<(), StoreError> {
        if let Some(otp) = self.lock_otps().iter_mut().find(|o| o.id == otp_id) {
            otp.used = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[tokio::test]
    async fn create_user_rejects_duplicate_email() {
        let store = MemStore::new();
        store
            .create_user("a@x.com", "hash", None)
            .await
            .expect("first create");
        let err = store
            .create_user("a@x.com", "other-hash", Some("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn latest_unused_otp_returns_most_recent() {
        let store = MemStore::new();
        let user = store.create_user("a@x.com", "hash", None).await.unwrap();
        let expires = OffsetDateTime::now_utc() + Duration::minutes(10);
        store.insert_otp(user.id, "hash-1", expires).await.unwrap();
        let second = store.insert_otp(user.id, "hash-2", expires).await.unwrap();

        let latest = store.latest_unused_otp(user.id).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test]
    async fn invalidate_unused_flips_all_unused_records() {
        let store = MemStore::new();
        let user = store.create_user("a@x.com", "hash", None).await.unwrap();
        let expires = OffsetDateTime::now_utc() + Duration::minutes(10);
        store.insert_otp(user.id, "hash-1", expires).await.unwrap();
        store.insert_otp(user.id, "hash-2", expires).await.unwrap();

        store.invalidate_unused_otps(user.id).await.unwrap();
        assert!(store.latest_unused_otp(user.id).await.unwrap().is_none());
    }
}
