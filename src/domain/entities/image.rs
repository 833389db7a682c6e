use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::constants::MAX_IMAGE_BYTES;
use crate::domain::entities::variant::VariantName;

/// Source-of-truth binary asset. The `slug` is the only externally visible
/// handle; the surrogate `id` never leaves the process.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Image {
    pub id: Uuid,
    pub slug: String,
    pub file_name: String,
    pub mime_type: String,
    #[serde(skip_serializing)]
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
    pub created_at: DateTime<Utc>,
}

/// An image about to be persisted. The slug is minted by the extractor or
/// the upload path, before the row exists.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub slug: String,
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
}

impl NewImage {
    /// Mints a fresh opaque slug. UUIDs are URL-safe and collision-free,
    /// which is all a slug has to be.
    pub fn generate_slug() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Lazily computed rendition of an `Image`. Never mutated after insert;
/// logically unique per `(image_id, variant_name)`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ImageVariant {
    pub id: Uuid,
    pub image_id: Uuid,
    pub variant_name: String,
    pub mime_type: String,
    #[serde(skip_serializing)]
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewImageVariant {
    pub image_id: Uuid,
    pub variant_name: VariantName,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
}

/// Direct upload request, assembled from multipart form data.
#[derive(Debug, Validate)]
pub struct ImageUploadRequest {
    #[validate(length(min = 1, max = MAX_IMAGE_BYTES, message = "Image is empty or exceeds the size limit"))]
    pub file_data: Vec<u8>,

    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
}

/// Metadata shape returned to API clients (bytes travel on their own route).
#[derive(Debug, Serialize)]
pub struct ImageMetaResponse {
    pub slug: String,
    pub file_name: String,
    pub mime_type: String,
    pub width: i32,
    pub height: i32,
    pub url: String,
}

impl From<&Image> for ImageMetaResponse {
    fn from(image: &Image) -> Self {
        ImageMetaResponse {
            slug: image.slug.clone(),
            file_name: image.file_name.clone(),
            mime_type: image.mime_type.clone(),
            width: image.width,
            height: image.height,
            url: format!("{}{}", crate::constants::IMAGE_URL_PREFIX, image.slug),
        }
    }
}
