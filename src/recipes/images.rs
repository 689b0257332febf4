use bytes::Bytes;
use image::ImageFormat;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo::{self, Recipe};
use crate::{error::ApiError, state::AppState};

const PRESIGN_TTL_SECS: u64 = 30 * 60;

/// Decode-check an uploaded payload. Anything that does not parse as an
/// image is rejected before any state changes.
pub fn validate_image(bytes: &[u8]) -> Result<ImageFormat, ApiError> {
    let format = image::guess_format(bytes)
        .map_err(|_| ApiError::field("image", "Upload a valid image."))?;
    image::load_from_memory_with_format(bytes, format)
        .map_err(|_| ApiError::field("image", "Upload a valid image."))?;
    Ok(format)
}

fn ext(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        _ => "img",
    }
}

fn content_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Store a validated image for a recipe, swap the reference, and drop
/// the previously stored object so no blob is left orphaned.
pub async fn attach(state: &AppState, recipe: &Recipe, bytes: Bytes) -> Result<String, ApiError> {
    let format = validate_image(&bytes)?;

    let key = format!(
        "recipes/{}/{}-{}.{}",
        recipe.user_id,
        recipe.id,
        Uuid::new_v4(),
        ext(format)
    );
    state
        .storage
        .put_object(&key, bytes, content_type(format))
        .await
        .map_err(ApiError::Internal)?;

    repo::set_image_key(&state.db, recipe.id, &key).await?;

    if let Some(old) = &recipe.image_key {
        if let Err(e) = state.storage.delete_object(old).await {
            warn!(error = %e, key = %old, "failed to delete replaced image");
        }
    }

    info!(recipe_id = %recipe.id, key = %key, "image attached");
    presign(state, &key).await
}

pub async fn presign(state: &AppState, key: &str) -> Result<String, ApiError> {
    state
        .storage
        .presign_get(key, PRESIGN_TTL_SECS)
        .await
        .map_err(ApiError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use image::RgbImage;
    use std::io::Cursor;

    fn sample_png() -> Vec<u8> {
        let img = RgbImage::new(2, 2);
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .expect("encode png");
        buf.into_inner()
    }

    #[test]
    fn accepts_decodable_png() {
        let bytes = sample_png();
        assert_eq!(validate_image(&bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn rejects_non_image_payload() {
        let err = validate_image(b"definitely not an image").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rejects_truncated_image() {
        // Keeps the magic bytes, drops the data.
        let mut bytes = sample_png();
        bytes.truncate(12);
        assert!(validate_image(&bytes).is_err());
    }

    #[test]
    fn format_mappings() {
        assert_eq!(ext(ImageFormat::Jpeg), "jpg");
        assert_eq!(ext(ImageFormat::Png), "png");
        assert_eq!(ext(ImageFormat::WebP), "webp");
        assert_eq!(content_type(ImageFormat::Jpeg), "image/jpeg");
        assert_eq!(content_type(ImageFormat::Gif), "image/gif");
    }

    #[tokio::test]
    async fn presign_carries_the_object_key() {
        let state = AppState::fake();
        let url = presign(&state, "recipes/u/r-1.png").await.unwrap();
        assert!(url.contains("recipes/u/r-1.png"));
    }
}
