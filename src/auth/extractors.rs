use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{auth::token, error::ApiError, state::AppState};

/// Resolves the bearer token from the Authorization header to the owning
/// user id. Handlers taking `AuthUser` reject unauthenticated requests
/// with 401 before touching any store.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::unauthorized("Invalid auth scheme"))?;

        let user = token::resolve(&state.db, token)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

        Ok(AuthUser(user.id))
    }
}
