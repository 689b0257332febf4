use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{RegisterRequest, TokenRequest, TokenResponse, UpdateProfileRequest, UserResponse},
        extractors::AuthUser,
        password,
        repo::User,
        token,
    },
    error::{ApiError, FieldErrors},
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 5;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/create", post(register))
        .route("/users/token", post(create_token).delete(revoke_token))
        .route("/users/me", get(me).patch(update_me))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let mut errors = FieldErrors::default();
    if !is_valid_email(&payload.email) {
        errors.push("email", "Enter a valid email address.");
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        errors.push("password", "Ensure this field has at least 5 characters.");
    }
    errors.into_result()?;

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::field(
            "email",
            "A user with this email already exists.",
        ));
    }

    let hash = password::hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.email, &hash, &payload.name).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
async fn create_token(
    State(state): State<AppState>,
    Json(mut payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // Fail closed: unknown email, inactive account and wrong password all
    // produce the same response.
    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) if u.is_active => u,
        _ => {
            warn!(email = %payload.email, "token request for unknown or inactive account");
            return Err(bad_credentials());
        }
    };

    let ok = password::verify_password(&payload.password, &user.password_hash).unwrap_or(false);
    if !ok {
        warn!(user_id = %user.id, "token request with invalid password");
        return Err(bad_credentials());
    }

    let token = token::issue(&state.db, user.id, state.config.token.ttl_days).await?;

    info!(user_id = %user.id, "token issued");
    Ok(Json(TokenResponse { token }))
}

fn bad_credentials() -> ApiError {
    ApiError::non_field("Unable to authenticate with provided credentials.")
}

#[instrument(skip(state))]
async fn revoke_token(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<StatusCode, ApiError> {
    token::revoke(&state.db, user_id).await?;
    info!(user_id = %user_id, "token revoked");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let password_hash = match payload.password.as_deref() {
        Some(p) if p.len() < MIN_PASSWORD_LEN => {
            return Err(ApiError::field(
                "password",
                "Ensure this field has at least 5 characters.",
            ));
        }
        Some(p) => Some(password::hash_password(p)?),
        None => None,
    };

    let user = User::update_profile(
        &state.db,
        user_id,
        payload.name.as_deref(),
        password_hash.as_deref(),
    )
    .await?;

    info!(user_id = %user.id, "profile updated");
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("a@test.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("spaces in@test.com"));
        assert!(!is_valid_email("@test.com"));
    }

    #[test]
    fn bad_credentials_is_a_field_level_400() {
        let err = bad_credentials();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn password_length_boundary() {
        assert!("test1".len() >= MIN_PASSWORD_LEN);
        assert!("pw".len() < MIN_PASSWORD_LEN);
    }
}
