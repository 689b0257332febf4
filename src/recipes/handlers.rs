use std::collections::BTreeSet;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use sqlx::types::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::{ApiError, FieldErrors},
    state::AppState,
    taxonomy::{self, repo::Taxon},
};

use super::dto::{
    CreateRecipeRequest, RecipeDetail, RecipeImageResponse, RecipeListItem, UpdateRecipeRequest,
};
use super::images;
use super::repo::{self, Recipe};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe)
                .put(update_recipe)
                .patch(update_recipe)
                .delete(delete_recipe),
        )
        .route(
            "/recipes/:id/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(20 * 1024 * 1024)),
        )
}

fn validate_fields(
    title: Option<&str>,
    time_minutes: Option<i32>,
    price: Option<Decimal>,
) -> Result<(), ApiError> {
    let mut errors = FieldErrors::default();
    if let Some(title) = title {
        if title.trim().is_empty() {
            errors.push("title", "This field may not be blank.");
        }
    }
    if let Some(minutes) = time_minutes {
        if minutes < 0 {
            errors.push(
                "time_minutes",
                "Ensure this value is greater than or equal to 0.",
            );
        }
    }
    if let Some(price) = price {
        if price < Decimal::ZERO {
            errors.push("price", "Ensure this value is greater than or equal to 0.");
        }
    }
    errors.into_result()
}

/// Deduplicate and resolve association ids under the owner. Any id that
/// does not resolve there fails the whole request.
async fn resolve_owned_set(
    state: &AppState,
    taxon: Taxon,
    user_id: Uuid,
    ids: &[Uuid],
    field: &str,
) -> Result<Vec<Uuid>, ApiError> {
    let wanted: Vec<Uuid> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    if wanted.is_empty() {
        return Ok(wanted);
    }
    let found = taxonomy::repo::filter_owned(&state.db, taxon, user_id, &wanted).await?;
    if found.len() != wanted.len() {
        warn!(user_id = %user_id, field = field, "association id does not resolve under owner");
        return Err(ApiError::field(field, "Invalid pk - object does not exist."));
    }
    Ok(wanted)
}

fn list_item(recipe: Recipe, tags: Vec<Uuid>, ingredients: Vec<Uuid>) -> RecipeListItem {
    RecipeListItem {
        id: recipe.id,
        title: recipe.title,
        time_minutes: recipe.time_minutes,
        price: recipe.price,
        link: recipe.link,
        tags,
        ingredients,
    }
}

async fn detail(state: &AppState, recipe: Recipe) -> Result<Json<RecipeDetail>, ApiError> {
    let tags = repo::linked_entities(&state.db, Taxon::Tag, recipe.id).await?;
    let ingredients = repo::linked_entities(&state.db, Taxon::Ingredient, recipe.id).await?;
    let image = match &recipe.image_key {
        Some(key) => Some(images::presign(state, key).await?),
        None => None,
    };
    Ok(Json(RecipeDetail {
        id: recipe.id,
        title: recipe.title,
        time_minutes: recipe.time_minutes,
        price: recipe.price,
        link: recipe.link,
        image,
        tags: tags.into_iter().map(Into::into).collect(),
        ingredients: ingredients.into_iter().map(Into::into).collect(),
    }))
}

#[instrument(skip(state))]
async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<RecipeListItem>>, ApiError> {
    let recipes = repo::list_by_user(&state.db, user_id).await?;
    let ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();
    let mut tags = repo::linked_ids_for_all(&state.db, Taxon::Tag, &ids).await?;
    let mut ingredients = repo::linked_ids_for_all(&state.db, Taxon::Ingredient, &ids).await?;

    let items = recipes
        .into_iter()
        .map(|r| {
            let t = tags.remove(&r.id).unwrap_or_default();
            let i = ingredients.remove(&r.id).unwrap_or_default();
            list_item(r, t, i)
        })
        .collect();
    Ok(Json(items))
}

#[instrument(skip(state, payload))]
async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<RecipeListItem>), ApiError> {
    validate_fields(
        Some(&payload.title),
        Some(payload.time_minutes),
        Some(payload.price),
    )?;
    let tag_ids = resolve_owned_set(&state, Taxon::Tag, user_id, &payload.tags, "tags").await?;
    let ingredient_ids = resolve_owned_set(
        &state,
        Taxon::Ingredient,
        user_id,
        &payload.ingredients,
        "ingredients",
    )
    .await?;

    let mut tx = state.db.begin().await?;
    let recipe = repo::insert(
        &mut tx,
        user_id,
        payload.title.trim(),
        payload.time_minutes,
        payload.price,
        payload.link.as_deref(),
    )
    .await?;
    repo::replace_links(&mut tx, Taxon::Tag, recipe.id, &tag_ids).await?;
    repo::replace_links(&mut tx, Taxon::Ingredient, recipe.id, &ingredient_ids).await?;
    tx.commit().await?;

    info!(recipe_id = %recipe.id, user_id = %user_id, "recipe created");
    Ok((
        StatusCode::CREATED,
        Json(list_item(recipe, tag_ids, ingredient_ids)),
    ))
}

#[instrument(skip(state))]
async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipeDetail>, ApiError> {
    let recipe = repo::find_by_id(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;
    detail(&state, recipe).await
}

#[instrument(skip(state, payload))]
async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRecipeRequest>,
) -> Result<Json<RecipeDetail>, ApiError> {
    validate_fields(payload.title.as_deref(), payload.time_minutes, payload.price)?;

    // Supplied association lists replace wholesale, an empty list clears;
    // omitted lists are untouched.
    let tag_ids = match &payload.tags {
        Some(ids) => Some(resolve_owned_set(&state, Taxon::Tag, user_id, ids, "tags").await?),
        None => None,
    };
    let ingredient_ids = match &payload.ingredients {
        Some(ids) => {
            Some(resolve_owned_set(&state, Taxon::Ingredient, user_id, ids, "ingredients").await?)
        }
        None => None,
    };

    let mut tx = state.db.begin().await?;
    let recipe = repo::update_fields(
        &mut tx,
        user_id,
        id,
        payload.title.as_deref().map(str::trim),
        payload.time_minutes,
        payload.price,
        payload.link.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Not found."))?;

    if let Some(ids) = &tag_ids {
        repo::replace_links(&mut tx, Taxon::Tag, recipe.id, ids).await?;
    }
    if let Some(ids) = &ingredient_ids {
        repo::replace_links(&mut tx, Taxon::Ingredient, recipe.id, ids).await?;
    }
    tx.commit().await?;

    info!(recipe_id = %recipe.id, "recipe updated");
    detail(&state, recipe).await
}

#[instrument(skip(state))]
async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    match repo::delete(&state.db, user_id, id).await? {
        None => Err(ApiError::not_found("Not found.")),
        Some(image_key) => {
            if let Some(key) = image_key {
                if let Err(e) = state.storage.delete_object(&key).await {
                    warn!(error = %e, key = %key, "failed to delete stored image");
                }
            }
            info!(recipe_id = %id, "recipe deleted");
            Ok(StatusCode::NO_CONTENT)
        }
    }
}

/// Multipart upload with a single `image` field.
#[instrument(skip(state, multipart))]
async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<RecipeImageResponse>, ApiError> {
    let recipe = repo::find_by_id(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;

    let mut data = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::field("image", "Invalid multipart body."))?
    {
        if field.name() == Some("image") {
            data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::field("image", "Invalid multipart body."))?,
            );
        }
    }
    let data = data.ok_or_else(|| ApiError::field("image", "No file was submitted."))?;

    let url = images::attach(&state, &recipe, data).await?;
    Ok(Json(RecipeImageResponse {
        id: recipe.id,
        image: url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_time_and_price_are_rejected_together() {
        let err = validate_fields(Some("Sample"), Some(-1), Some(Decimal::new(-100, 2)))
            .unwrap_err();
        match err {
            ApiError::Validation(map) => {
                assert!(map.contains_key("time_minutes"));
                assert!(map.contains_key("price"));
                assert!(!map.contains_key("title"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_title_is_rejected() {
        assert!(validate_fields(Some("   "), None, None).is_err());
    }

    #[test]
    fn absent_fields_validate_fine() {
        assert!(validate_fields(None, None, None).is_ok());
        assert!(validate_fields(Some("Sample"), Some(0), Some(Decimal::ZERO)).is_ok());
    }
}
