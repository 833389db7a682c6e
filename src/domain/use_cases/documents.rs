use uuid::Uuid;
use tracing::debug;
use validator::Validate;

use crate::{
    entities::document::{DocumentContentRequest, DocumentResponse},
    errors::AppError,
    infrastructure::utils::extract::extract_content,
    repositories::document::DocumentRepository,
};

/// Orchestrates the sanitize → extract → persist-and-sweep pipeline. After
/// every call the images attached to a document are exactly the slugs cited
/// in its stored html; the invariant is re-derived from scratch per edit.
pub struct DocumentHandler<R>
where
    R: DocumentRepository,
{
    pub document_repo: R,
}

impl<R> DocumentHandler<R>
where
    R: DocumentRepository,
{
    pub fn new(document_repo: R) -> Self {
        DocumentHandler { document_repo }
    }

    /// Creates or updates the document's rich-text content. `document_id`
    /// of `None` mints a fresh document. The persist (html update, orphan
    /// sweep, new-image attach) is a single atomic unit; on failure no
    /// partial state is observable.
    pub async fn ensure_document(
        &self,
        document_id: Option<Uuid>,
        request: DocumentContentRequest,
    ) -> Result<DocumentResponse, AppError> {
        request.validate()?;

        let id = document_id.unwrap_or_else(Uuid::new_v4);
        let extracted = extract_content(&request.html);

        debug!(
            document_id = %id,
            new_images = extracted.new_images.len(),
            referenced = extracted.referenced_slugs.len(),
            "applying document content update"
        );

        let document = self
            .document_repo
            .apply_content_update(&id, &extracted.html, &extracted.new_images, &extracted.referenced_slugs)
            .await?;

        let attached = self.document_repo.list_attached_images(&id).await?;
        Ok(DocumentResponse::from_parts(document, attached))
    }

    /// Retrieves a document together with the slugs of its attached images
    pub async fn get_document(&self, id: &Uuid) -> Result<DocumentResponse, AppError> {
        let document = self.document_repo.get_document(id).await?;
        let attached = self.document_repo.list_attached_images(id).await?;
        Ok(DocumentResponse::from_parts(document, attached))
    }

    /// Deletes a document and, through explicit cascade, every image it owns
    pub async fn delete_document(&self, id: &Uuid) -> Result<(), AppError> {
        self.document_repo.delete_document(id).await
    }
}
