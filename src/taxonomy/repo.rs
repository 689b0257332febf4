use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// The two owner-scoped name lists recipes link to. They share a shape
/// and a repo; only the tables differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxon {
    Tag,
    Ingredient,
}

impl Taxon {
    pub fn table(self) -> &'static str {
        match self {
            Taxon::Tag => "tags",
            Taxon::Ingredient => "ingredients",
        }
    }

    pub fn link_table(self) -> &'static str {
        match self {
            Taxon::Tag => "recipe_tags",
            Taxon::Ingredient => "recipe_ingredients",
        }
    }

    pub fn link_column(self) -> &'static str {
        match self {
            Taxon::Tag => "tag_id",
            Taxon::Ingredient => "ingredient_id",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NamedEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: OffsetDateTime,
}

pub async fn list_by_user(
    db: &PgPool,
    taxon: Taxon,
    user_id: Uuid,
) -> anyhow::Result<Vec<NamedEntity>> {
    let sql = format!(
        "SELECT id, user_id, name, created_at FROM {} WHERE user_id = $1 ORDER BY name DESC",
        taxon.table()
    );
    let rows = sqlx::query_as::<_, NamedEntity>(&sql)
        .bind(user_id)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Raw sqlx error so callers can tell a duplicate name apart from other
/// failures.
pub async fn insert(
    db: &PgPool,
    taxon: Taxon,
    user_id: Uuid,
    name: &str,
) -> Result<NamedEntity, sqlx::Error> {
    let sql = format!(
        "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id, user_id, name, created_at",
        taxon.table()
    );
    sqlx::query_as::<_, NamedEntity>(&sql)
        .bind(user_id)
        .bind(name)
        .fetch_one(db)
        .await
}

/// Of the given ids, return those that exist under this owner.
pub async fn filter_owned(
    db: &PgPool,
    taxon: Taxon,
    user_id: Uuid,
    ids: &[Uuid],
) -> anyhow::Result<Vec<Uuid>> {
    let sql = format!(
        "SELECT id FROM {} WHERE user_id = $1 AND id = ANY($2)",
        taxon.table()
    );
    let rows: Vec<(Uuid,)> = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(ids)
        .fetch_all(db)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxon_tables() {
        assert_eq!(Taxon::Tag.table(), "tags");
        assert_eq!(Taxon::Ingredient.table(), "ingredients");
        assert_eq!(Taxon::Tag.link_table(), "recipe_tags");
        assert_eq!(Taxon::Ingredient.link_table(), "recipe_ingredients");
        assert_eq!(Taxon::Tag.link_column(), "tag_id");
        assert_eq!(Taxon::Ingredient.link_column(), "ingredient_id");
    }
}
