use serde::{Deserialize, Serialize};
use sqlx::types::Decimal;
use uuid::Uuid;

use crate::taxonomy::dto::NamedEntityResponse;

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub tags: Vec<Uuid>,
    #[serde(default)]
    pub ingredients: Vec<Uuid>,
}

/// Partial update body. `None` for an association list means "leave it
/// alone"; an explicit empty list clears it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRecipeRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub time_minutes: Option<i32>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<Uuid>>,
    #[serde(default)]
    pub ingredients: Option<Vec<Uuid>>,
}

/// List rows carry associations as bare id arrays for compactness.
#[derive(Debug, Serialize)]
pub struct RecipeListItem {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<Uuid>,
}

/// Single-item reads expand associations into full objects and include
/// the image URL.
#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub image: Option<String>,
    pub tags: Vec<NamedEntityResponse>,
    pub ingredients: Vec<NamedEntityResponse>,
}

#[derive(Debug, Serialize)]
pub struct RecipeImageResponse {
    pub id: Uuid,
    pub image: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_tags_stay_none() {
        let req: UpdateRecipeRequest = serde_json::from_str(r#"{"title":"new"}"#).unwrap();
        assert!(req.tags.is_none());
        assert!(req.ingredients.is_none());
    }

    #[test]
    fn explicit_empty_tags_deserialize_as_empty_list() {
        let req: UpdateRecipeRequest = serde_json::from_str(r#"{"tags":[]}"#).unwrap();
        assert_eq!(req.tags, Some(vec![]));
        assert!(req.ingredients.is_none());
    }

    #[test]
    fn create_accepts_numeric_and_string_prices() {
        let a: CreateRecipeRequest =
            serde_json::from_str(r#"{"title":"Sample","time_minutes":10,"price":5.00}"#).unwrap();
        let b: CreateRecipeRequest =
            serde_json::from_str(r#"{"title":"Sample","time_minutes":10,"price":"5.00"}"#).unwrap();
        assert_eq!(a.price, b.price);
        assert!(a.tags.is_empty());
    }

    #[test]
    fn price_serializes_with_two_decimal_places() {
        let item = RecipeListItem {
            id: Uuid::new_v4(),
            title: "Sample".into(),
            time_minutes: 10,
            price: Decimal::new(500, 2),
            link: None,
            tags: vec![],
            ingredients: vec![],
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("5.00"));
    }
}
