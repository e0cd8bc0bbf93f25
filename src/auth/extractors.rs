use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use tracing::warn;

use crate::auth::error::AuthError;
use crate::auth::repo_types::User;
use crate::auth::services;
use crate::state::AppState;

/// Extracts the bearer token, validates it structurally and against the live
/// password version, and yields the authenticated user. Every failure mode
/// is the same opaque 401.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::Unauthorized)?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(AuthError::Unauthorized)?;

        services::authenticate_token(state, token)
            .await
            .map(AuthUser)
            .map_err(|e| {
                warn!(error = %e, "bearer token rejected");
                AuthError::Unauthorized
            })
    }
}
