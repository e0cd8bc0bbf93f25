use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::config::JwtConfig;

/// JWT payload. `pv` is the user's password version at mint time; a token is
/// only honored while it matches the live version (see
/// `services::authenticate_token`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub pv: i32,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
}

/// Signing and verification keys, built once from config at startup and
/// carried in `AppState`.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::from_secs((config.ttl_minutes as u64) * 60),
        }
    }

    /// Mint a bearer token embedding the user's identity and current
    /// password version. Never consults any revocation state.
    pub fn sign(&self, user: &User) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            pv: user.password_version,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, pv = user.password_version, "jwt signed");
        Ok(token)
    }

    /// Structural validation only: signature, expiry, issuer, audience. The
    /// caller still has to compare `pv` against the live user record.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
        })
    }

    fn make_user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            password_hash: "hash".into(),
            name: None,
            password_version: 3,
            is_verified: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user = make_user();
        let token = keys.sign(&user).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.pv, 3);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let keys = make_keys("secret-a", "iss", "aud");
        let other = make_keys("secret-b", "iss", "aud");
        let token = keys.sign(&make_user()).expect("sign");
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let bad = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good.sign(&make_user()).expect("sign");
        assert!(bad.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_garbage_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        assert!(keys.verify("not.a.jwt").is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let user = make_user();
        // Hand-roll a token expired beyond the default leeway.
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            pv: user.password_version,
            iat: (now - TimeDuration::minutes(10)).unix_timestamp() as usize,
            exp: (now - TimeDuration::minutes(5)).unix_timestamp() as usize,
            iss: "iss".into(),
            aud: "aud".into(),
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).expect("encode");
        assert!(keys.verify(&token).is_err());
    }
}
