use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::constants::MAX_DOCUMENT_HTML_BYTES;

/// A rich-text body plus the set of images it owns. The html stored here is
/// always the sanitized form; raw user input never reaches the database.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub html: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ownership edge between a Document and an Image. The Image it wraps has
/// no existence independent of the document; removing the edge removes the
/// image (and its variants) with it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentImage {
    pub id: Uuid,
    pub document_id: Uuid,
    pub image_id: Uuid,
}

/// Join row enriched with the slug, the shape the garbage collector works on.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttachedImage {
    pub document_image_id: Uuid,
    pub image_id: Uuid,
    pub slug: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DocumentContentRequest {
    #[validate(length(max = MAX_DOCUMENT_HTML_BYTES, message = "Document body exceeds the size limit"))]
    pub html: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub html: Option<String>,
    pub image_slugs: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentResponse {
    pub fn from_parts(document: Document, attached: Vec<AttachedImage>) -> Self {
        DocumentResponse {
            id: document.id,
            html: document.html,
            image_slugs: attached.into_iter().map(|a| a.slug).collect(),
            updated_at: document.updated_at,
        }
    }
}
