use actix_multipart::Multipart;
use actix_web::{
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web, HttpResponse, Responder,
};
use futures_util::TryStreamExt;
use tracing::instrument;

use crate::{
    constants::MAX_IMAGE_BYTES,
    entities::image::{ImageMetaResponse, ImageUploadRequest},
    entities::variant::VariantName,
    errors::AppError,
    AppState,
};

/// GET /api/images/{slug} — original bytes, served inline.
#[instrument(skip(state))]
pub async fn get_image(
    slug: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let image = state.image_handler.get_image_by_slug(&slug).await?;

    Ok(HttpResponse::Ok()
        .content_type(image.mime_type.clone())
        .insert_header(ContentDisposition {
            disposition: DispositionType::Inline,
            parameters: vec![DispositionParam::Filename(image.file_name.clone())],
        })
        .body(image.data))
}

/// GET /api/images/{slug}/{variant} — named rendition, computed on first
/// access. Unknown variant names are rejected before any lookup.
#[instrument(skip(state))]
pub async fn get_image_variant(
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let (slug, variant) = path.into_inner();
    let variant: VariantName = variant.parse()?;

    let image = state.image_handler.get_image_by_slug(&slug).await?;
    let rendition = state.image_handler.ensure_variant(&image, variant).await?;

    Ok(HttpResponse::Ok()
        .content_type(rendition.mime_type.clone())
        .body(rendition.data))
}

/// POST /api/images — direct multipart upload (field name `file`).
#[instrument(skip(state, payload))]
pub async fn upload_image(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<impl Responder, AppError> {
    let mut file_data: Vec<u8> = Vec::new();
    let mut file_name = String::from("upload");

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        if let Some(name) = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
        {
            file_name = name.to_string();
        }

        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Upload stream error: {}", e)))?
        {
            if file_data.len() + chunk.len() > MAX_IMAGE_BYTES as usize {
                return Err(AppError::InvalidInput("Uploaded image exceeds the size limit".into()));
            }
            file_data.extend_from_slice(&chunk);
        }
    }

    let image = state
        .image_handler
        .upload_image(ImageUploadRequest { file_data, file_name })
        .await?;

    Ok(HttpResponse::Created().json(ImageMetaResponse::from(&image)))
}
