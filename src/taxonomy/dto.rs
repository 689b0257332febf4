use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::taxonomy::repo::NamedEntity;

#[derive(Debug, Deserialize)]
pub struct CreateNamedEntityRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct NamedEntityResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<NamedEntity> for NamedEntityResponse {
    fn from(entity: NamedEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn response_hides_owner() {
        let entity = NamedEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "vegan".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&NamedEntityResponse::from(entity)).unwrap();
        assert!(json.contains("vegan"));
        assert!(!json.contains("user_id"));
    }
}
