use rand::{rngs::OsRng, Rng};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::password;
use crate::auth::repo_types::OtpRecord;
use crate::auth::store::{AuthStore, StoreError};
use crate::config::OtpConfig;

/// Why an OTP could not be consumed. The external API collapses these into
/// one generic message; internally they stay distinguishable.
#[derive(Debug, Error)]
pub enum OtpError {
    #[error("no active OTP for user")]
    NotFound,
    #[error("OTP expired")]
    Expired,
    #[error("OTP does not match")]
    Mismatch,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Uniform numeric code over the full digit range, zero-padded.
pub fn generate_code(digits: u32) -> String {
    let span = 10u64.pow(digits);
    let n = OsRng.gen_range(0..span);
    format!("{:0width$}", n, width = digits as usize)
}

/// Issue a fresh OTP for the user: invalidate every outstanding unused
/// record, then persist a new hashed one. Returns the record together with
/// the plaintext code, which exists only for one-shot delivery and is never
/// persisted.
pub async fn issue(
    store: &dyn AuthStore,
    config: &OtpConfig,
    user_id: Uuid,
) -> anyhow::Result<(OtpRecord, String)> {
    let code = generate_code(config.digits);
    let code_hash = password::hash_password(&code)?;

    store.invalidate_unused_otps(user_id).await?;
    let expires_at = OffsetDateTime::now_utc() + Duration::minutes(config.ttl_minutes);
    let record = store.insert_otp(user_id, &code_hash, expires_at).await?;

    debug!(user_id = %user_id, otp_id = %record.id, "otp issued");
    Ok((record, code))
}

/// Consume the most recent unused OTP for the user. On success the record is
/// marked used and can never be consumed again.
pub async fn consume(
    store: &dyn AuthStore,
    user_id: Uuid,
    presented_code: &str,
) -> Result<OtpRecord, OtpError> {
    let Some(mut record) = store.latest_unused_otp(user_id).await? else {
        return Err(OtpError::NotFound);
    };

    if record.expires_at < OffsetDateTime::now_utc() {
        return Err(OtpError::Expired);
    }

    if !password::verify_password(presented_code, &record.code_hash) {
        return Err(OtpError::Mismatch);
    }

    store.mark_otp_used(record.id).await?;
    record.used = true;
    debug!(user_id = %user_id, otp_id = %record.id, "otp consumed");
    Ok(record)
}
