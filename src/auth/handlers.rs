use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::auth::dto::{
    AuthResponse, LoginRequest, OkResponse, PublicUser, RegisterRequest, RegisterResponse,
    RequestPasswordResetRequest, ResendOtpRequest, ResetPasswordRequest, UpdateProfileRequest,
    VerifyOtpRequest,
};
use crate::auth::error::AuthError;
use crate::auth::extractors::AuthUser;
use crate::auth::services::{self, is_valid_email, normalize_email, RegisterOutcome};
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/resend-otp", post(resend_otp))
        .route("/auth/login", post(login))
        .route("/auth/request-password-reset", post(request_password_reset))
        .route("/auth/reset-password", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).put(update_me))
}

fn require_email(email: &str) -> Result<(), AuthError> {
    if !is_valid_email(&normalize_email(email)) {
        return Err(AuthError::Validation("Invalid email"));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    require_email(&payload.email)?;
    if payload.password.len() < 8 {
        return Err(AuthError::Validation("Password too short"));
    }

    let outcome = services::register(
        &state,
        &payload.email,
        &payload.password,
        payload.name.as_deref(),
    )
    .await?;

    let (user, message) = match &outcome {
        RegisterOutcome::Created { user } => (user, "OTP sent to email"),
        RegisterOutcome::CreatedButNotifyFailed { user } => {
            (user, "User created but OTP email failed to send")
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: PublicUser::from(user),
            user_id: user.id,
            message: message.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<OkResponse>, AuthError> {
    if payload.email.is_empty() || payload.otp.is_empty() {
        return Err(AuthError::Validation("Missing email or OTP"));
    }

    services::verify_otp(&state, &payload.email, &payload.otp).await?;
    Ok(Json(OkResponse::new("Email verified")))
}

#[instrument(skip(state, payload))]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<ResendOtpRequest>,
) -> Result<Json<OkResponse>, AuthError> {
    require_email(&payload.email)?;

    services::resend_otp(&state, &payload.email).await?;
    Ok(Json(OkResponse::new("OTP resent")))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(AuthError::Validation("Missing email or password"));
    }

    let session = services::login(&state, &payload.email, &payload.password).await?;
    Ok(Json(AuthResponse {
        token: session.token,
        user: PublicUser::from(&session.user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<RequestPasswordResetRequest>,
) -> Result<Json<OkResponse>, AuthError> {
    require_email(&payload.email)?;

    services::request_password_reset(&state, &payload.email).await?;
    Ok(Json(OkResponse::new(
        "If an account with that email exists, an OTP was sent.",
    )))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<OkResponse>, AuthError> {
    if payload.email.is_empty() || payload.otp.is_empty() {
        return Err(AuthError::Validation("Missing fields"));
    }
    if payload.new_password.len() < 8 {
        return Err(AuthError::Validation("Password too short"));
    }

    services::reset_password(&state, &payload.email, &payload.otp, &payload.new_password).await?;
    Ok(Json(OkResponse::new("Password has been reset successfully")))
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(user): AuthUser) -> Result<Json<PublicUser>, AuthError> {
    Ok(Json(PublicUser::from(&user)))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    if payload.name.trim().is_empty() {
        return Err(AuthError::Validation("Missing name"));
    }

    let updated = services::update_profile(&state, user, payload.name.trim()).await?;
    Ok(Json(PublicUser::from(&updated)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_rejects_invalid_email() {
        let state = AppState::fake();
        let err = register(
            State(state),
            Json(RegisterRequest {
                email: "not-an-email".into(),
                password: "long-enough-pw".into(),
                name: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        let state = AppState::fake();
        let err = register(
            State(state),
            Json(RegisterRequest {
                email: "a@x.com".into(),
                password: "short".into(),
                name: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn register_returns_created_with_public_user() {
        let state = AppState::fake();
        let (status, Json(body)) = register(
            State(state),
            Json(RegisterRequest {
                email: " A@X.com ".into(),
                password: "password-1".into(),
                name: Some("Ada".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.user.email, "a@x.com");
        assert_eq!(body.user_id, body.user.id);
        assert!(!body.user.is_verified);
    }
}
