use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// API error taxonomy. Validation failures carry field-level messages;
/// everything else answers with a `detail` string and the matching
/// status code. Cross-owner access surfaces as `NotFound`, never 403.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(HashMap<String, Vec<String>>),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn field(field: &str, message: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::Validation(errors)
    }

    /// Validation error not tied to any one field.
    pub fn non_field(message: &str) -> Self {
        Self::field("non_field_errors", message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::Unauthorized(message.to_string())
    }

    pub fn not_found(message: &str) -> Self {
        Self::NotFound(message.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

/// True when a write was rejected for violating a unique constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::Unauthorized(detail) | ApiError::NotFound(detail) => {
                json!({ "detail": detail })
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                json!({ "detail": "Internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Accumulates field-level messages so a request can report every bad
/// field at once.
#[derive(Debug, Default)]
pub struct FieldErrors(HashMap<String, Vec<String>>);

impl FieldErrors {
    pub fn push(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn validation_error_is_400_with_field_map() {
        let res = ApiError::field("email", "Enter a valid email address.").into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["email"][0], "Enter a valid email address.");
    }

    #[tokio::test]
    async fn non_field_errors_land_under_their_own_key() {
        let res = ApiError::non_field("Unable to authenticate with provided credentials.")
            .into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(
            json["non_field_errors"][0],
            "Unable to authenticate with provided credentials."
        );
    }

    #[tokio::test]
    async fn unauthorized_is_401_with_detail() {
        let res = ApiError::unauthorized("Invalid or expired token").into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(res).await;
        assert_eq!(json["detail"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let res = ApiError::not_found("Not found.").into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn field_errors_collect_multiple_fields() {
        let mut errors = FieldErrors::default();
        errors.push("title", "This field may not be blank.");
        errors.push("price", "Ensure this value is greater than or equal to 0.");
        let err = errors.into_result().unwrap_err();
        match err {
            ApiError::Validation(map) => {
                assert_eq!(map.len(), 2);
                assert_eq!(map["title"].len(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::default().into_result().is_ok());
    }
}
