use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{OtpRecord, User};
use crate::auth::store::{AuthStore, StoreError};

/// Postgres-backed [`AuthStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, password_version, is_verified,
                   created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, password_version, is_verified,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, name)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, name, password_version, is_verified,
                      created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
            _ => StoreError::Database(e),
        })?;
        Ok(user)
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET name = $2,
                password_hash = $3,
                password_version = $4,
                is_verified = $5,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.password_version)
        .bind(user.is_verified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_otp(
        &self,
        user_id: Uuid,
        code_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<OtpRecord, StoreError> {
        let record = sqlx::query_as::<_, OtpRecord>(
            r#"
            INSERT INTO otps (user_id, code_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, code_hash, expires_at, used, created_at
            "#,
        )
        .bind(user_id)
        .bind(code_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn latest_unused_otp(&self, user_id: Uuid) -> Result<Option<OtpRecord>, StoreError> {
        let record = sqlx::query_as::<_, OtpRecord>(
            r#"
            SELECT id, user_id, code_hash, expires_at, used, created_at
            FROM otps
            WHERE user_id = $1 AND used = FALSE
            ORDER BY created_at DESC, id
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn invalidate_unused_otps(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE otps
            SET used = TRUE
            WHERE user_id = $1 AND used = FALSE
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_otp_used(&self, otp_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE otps
            SET used = TRUE
            WHERE id = $1
            "#,
        )
        .bind(otp_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
