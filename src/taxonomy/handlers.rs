use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::{is_unique_violation, ApiError},
    state::AppState,
};

use super::dto::{CreateNamedEntityRequest, NamedEntityResponse};
use super::repo::{self, Taxon};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route("/ingredients", get(list_ingredients).post(create_ingredient))
}

#[instrument(skip(state))]
async fn list_tags(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<NamedEntityResponse>>, ApiError> {
    list(&state, Taxon::Tag, user_id).await
}

#[instrument(skip(state))]
async fn list_ingredients(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<NamedEntityResponse>>, ApiError> {
    list(&state, Taxon::Ingredient, user_id).await
}

#[instrument(skip(state, payload))]
async fn create_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateNamedEntityRequest>,
) -> Result<(StatusCode, Json<NamedEntityResponse>), ApiError> {
    create(&state, Taxon::Tag, user_id, payload).await
}

#[instrument(skip(state, payload))]
async fn create_ingredient(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateNamedEntityRequest>,
) -> Result<(StatusCode, Json<NamedEntityResponse>), ApiError> {
    create(&state, Taxon::Ingredient, user_id, payload).await
}

async fn list(
    state: &AppState,
    taxon: Taxon,
    user_id: Uuid,
) -> Result<Json<Vec<NamedEntityResponse>>, ApiError> {
    let rows = repo::list_by_user(&state.db, taxon, user_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Owner is always the authenticated user; the payload cannot override it.
async fn create(
    state: &AppState,
    taxon: Taxon,
    user_id: Uuid,
    payload: CreateNamedEntityRequest,
) -> Result<(StatusCode, Json<NamedEntityResponse>), ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::field("name", "This field may not be blank."));
    }

    match repo::insert(&state.db, taxon, user_id, name).await {
        Ok(row) => {
            info!(user_id = %user_id, table = taxon.table(), name = %row.name, "created");
            Ok((StatusCode::CREATED, Json(row.into())))
        }
        Err(e) if is_unique_violation(&e) => Err(ApiError::field(
            "name",
            "An entry with this name already exists.",
        )),
        Err(e) => Err(e.into()),
    }
}
