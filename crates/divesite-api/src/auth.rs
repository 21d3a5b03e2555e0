use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::SaltString,
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use rand_core::OsRng;
use tracing::{info, warn};

use divesite_types::api::{CheckTokenRequest, LoginRequest, RegisterRequest, TokenResponse};
use divesite_types::validation::validate_email;

use crate::error::{ApiError, ApiResult, JsonBody};
use crate::middleware::{create_token, decode_token};
use crate::state::{AppState, blocking};

const MIN_PASSWORD_LEN: usize = 8;

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_string();
    validate_email(&email).map_err(|e| ApiError::BadRequest(e.0))?;
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        )));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            warn!("Password hashing failed: {}", e);
            ApiError::Internal
        })?
        .to_string();

    let name = req.full_name.unwrap_or_default();
    let user = blocking(&state, move |db| db.create_user(&email, &password_hash, name.trim())).await?;
    info!("Registered user {}", user.id);

    let token = create_token(&state.jwt_secret, state.token_ttl_days, user.id, &user.email)?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token, user: user.id })))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let invalid = || ApiError::BadRequest("Unable to log in with provided credentials.".into());

    let email = req.email.trim().to_string();
    let user = blocking(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(invalid)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password).map_err(|_| ApiError::Internal)?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    let token = create_token(&state.jwt_secret, state.token_ttl_days, user.id, &user.email)?;
    Ok(Json(TokenResponse { token, user: user.id }))
}

/// 200 if the token is valid and belongs to the given user, otherwise 401.
pub async fn check_token(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<CheckTokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let (Some(token), Some(user)) = (req.token, req.user) else {
        return Err(ApiError::Unauthorized);
    };

    match decode_token(&state.jwt_secret, &token) {
        Ok(claims) if claims.sub == user => {}
        _ => return Err(ApiError::Unauthorized),
    }

    // Tokens outlive deleted accounts
    blocking(&state, move |db| db.get_user_by_id(user))
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(TokenResponse { token, user }))
}
