use actix_web::{web, HttpResponse, Responder};
use tracing::instrument;

use crate::{
    entities::document::DocumentContentRequest,
    errors::AppError,
    infrastructure::utils::valid_uuid::valid_uuid,
    AppState,
};

/// POST /api/documents — create a document from a rich-text body.
#[instrument(skip(state, data))]
pub async fn create_document(
    state: web::Data<AppState>,
    data: web::Json<DocumentContentRequest>,
) -> Result<impl Responder, AppError> {
    let document = state
        .document_handler
        .ensure_document(None, data.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(document))
}

/// PUT /api/documents/{id} — re-run the pipeline over an edited body.
#[instrument(skip(document_id, state, data))]
pub async fn update_document(
    document_id: web::Path<String>,
    state: web::Data<AppState>,
    data: web::Json<DocumentContentRequest>,
) -> Result<impl Responder, AppError> {
    let id = valid_uuid(&document_id)?;
    let document = state
        .document_handler
        .ensure_document(Some(id), data.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(document))
}

#[instrument(skip(document_id, state))]
pub async fn get_document(
    document_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let id = valid_uuid(&document_id)?;
    let document = state.document_handler.get_document(&id).await?;
    Ok(HttpResponse::Ok().json(document))
}

#[instrument(skip(document_id, state))]
pub async fn delete_document(
    document_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let id = valid_uuid(&document_id)?;
    state.document_handler.delete_document(&id).await?;
    Ok(HttpResponse::NoContent().finish())
}
