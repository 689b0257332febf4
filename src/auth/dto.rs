use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

/// Request body for obtaining a bearer token.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Partial profile update; omitted fields keep their stored values.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Public part of a user returned to clients. The password never leaves
/// the server in any form.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_response_serialization() {
        let response = UserResponse {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            name: "test".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("id"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn register_request_name_defaults_to_empty() {
        let req: RegisterRequest =
            serde_json::from_str(r#"{"email":"a@test.com","password":"test123"}"#).unwrap();
        assert_eq!(req.name, "");
    }

    #[test]
    fn update_profile_fields_are_optional() {
        let req: UpdateProfileRequest = serde_json::from_str(r#"{"name":"new name"}"#).unwrap();
        assert_eq!(req.name.as_deref(), Some("new name"));
        assert!(req.password.is_none());
    }
}
