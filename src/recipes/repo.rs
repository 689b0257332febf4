use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{types::Decimal, FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::taxonomy::repo::{NamedEntity, Taxon};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub image_key: Option<String>,
    pub created_at: OffsetDateTime,
}

const RECIPE_COLUMNS: &str =
    "id, user_id, title, time_minutes, price, link, image_key, created_at";

/// Newest first. Ids are v4 uuids, so recency comes from `created_at`
/// with the id as tiebreaker.
pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Recipe>> {
    let rows = sqlx::query_as::<_, Recipe>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes
         WHERE user_id = $1
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// `None` for an id that does not exist under this owner, including ids
/// owned by someone else.
pub async fn find_by_id(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Recipe>> {
    let recipe = sqlx::query_as::<_, Recipe>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(recipe)
}

pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    title: &str,
    time_minutes: i32,
    price: Decimal,
    link: Option<&str>,
) -> anyhow::Result<Recipe> {
    let recipe = sqlx::query_as::<_, Recipe>(&format!(
        "INSERT INTO recipes (user_id, title, time_minutes, price, link)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {RECIPE_COLUMNS}"
    ))
    .bind(user_id)
    .bind(title)
    .bind(time_minutes)
    .bind(price)
    .bind(link)
    .fetch_one(&mut **tx)
    .await?;
    Ok(recipe)
}

/// Partial field update; `None` keeps the stored value. Returns `None`
/// when the row does not exist under this owner.
pub async fn update_fields(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    id: Uuid,
    title: Option<&str>,
    time_minutes: Option<i32>,
    price: Option<Decimal>,
    link: Option<&str>,
) -> anyhow::Result<Option<Recipe>> {
    let recipe = sqlx::query_as::<_, Recipe>(&format!(
        "UPDATE recipes
         SET title = COALESCE($3, title),
             time_minutes = COALESCE($4, time_minutes),
             price = COALESCE($5, price),
             link = COALESCE($6, link)
         WHERE id = $1 AND user_id = $2
         RETURNING {RECIPE_COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .bind(title)
    .bind(time_minutes)
    .bind(price)
    .bind(link)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(recipe)
}

/// Returns the stored image key of the deleted row, or `None` when no
/// row matched this owner.
pub async fn delete(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> anyhow::Result<Option<Option<String>>> {
    let row: Option<(Option<String>,)> = sqlx::query_as(
        r#"DELETE FROM recipes WHERE id = $1 AND user_id = $2 RETURNING image_key"#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row.map(|(key,)| key))
}

pub async fn set_image_key(db: &PgPool, id: Uuid, key: &str) -> anyhow::Result<()> {
    sqlx::query(r#"UPDATE recipes SET image_key = $2 WHERE id = $1"#)
        .bind(id)
        .bind(key)
        .execute(db)
        .await?;
    Ok(())
}

/// Replace the association set wholesale. Runs inside the caller's
/// transaction so a half-written set never becomes visible.
pub async fn replace_links(
    tx: &mut Transaction<'_, Postgres>,
    taxon: Taxon,
    recipe_id: Uuid,
    ids: &[Uuid],
) -> anyhow::Result<()> {
    let delete_sql = format!("DELETE FROM {} WHERE recipe_id = $1", taxon.link_table());
    sqlx::query(&delete_sql)
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;

    let insert_sql = format!(
        "INSERT INTO {} (recipe_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        taxon.link_table(),
        taxon.link_column()
    );
    for id in ids {
        sqlx::query(&insert_sql)
            .bind(recipe_id)
            .bind(id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Association ids for a page of recipes in one query, grouped by recipe.
pub async fn linked_ids_for_all(
    db: &PgPool,
    taxon: Taxon,
    recipe_ids: &[Uuid],
) -> anyhow::Result<HashMap<Uuid, Vec<Uuid>>> {
    if recipe_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT recipe_id, {} FROM {} WHERE recipe_id = ANY($1)",
        taxon.link_column(),
        taxon.link_table()
    );
    let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(&sql).bind(recipe_ids).fetch_all(db).await?;

    let mut grouped: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (recipe_id, linked_id) in rows {
        grouped.entry(recipe_id).or_default().push(linked_id);
    }
    Ok(grouped)
}

/// Full linked entities for a detail view, name-descending like the
/// taxonomy lists.
pub async fn linked_entities(
    db: &PgPool,
    taxon: Taxon,
    recipe_id: Uuid,
) -> anyhow::Result<Vec<NamedEntity>> {
    let sql = format!(
        "SELECT t.id, t.user_id, t.name, t.created_at
         FROM {} t
         JOIN {} l ON l.{} = t.id
         WHERE l.recipe_id = $1
         ORDER BY t.name DESC",
        taxon.table(),
        taxon.link_table(),
        taxon.link_column()
    );
    let rows = sqlx::query_as::<_, NamedEntity>(&sql)
        .bind(recipe_id)
        .fetch_all(db)
        .await?;
    Ok(rows)
}
