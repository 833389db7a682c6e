use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    entities::document::{AttachedImage, Document},
    entities::image::NewImage,
    errors::AppError,
    repositories::sqlx_repo::SqlxDocumentRepo,
};

#[async_trait]
pub trait DocumentRepository: Sync + Send {
    async fn get_document(&self, id: &Uuid) -> Result<Document, AppError>;
    async fn list_attached_images(&self, document_id: &Uuid) -> Result<Vec<AttachedImage>, AppError>;

    /// Atomic persist of one edit: upsert the document's html, drop every
    /// previously attached image whose slug is absent from
    /// `referenced_slugs` (mark-and-sweep, cascading join → variants →
    /// image), attach `new_images`. Any failure rolls the whole edit back.
    async fn apply_content_update(
        &self,
        document_id: &Uuid,
        html: &str,
        new_images: &[NewImage],
        referenced_slugs: &HashSet<String>,
    ) -> Result<Document, AppError>;

    /// Explicit cascade: variants, joins and images go with the document.
    async fn delete_document(&self, id: &Uuid) -> Result<(), AppError>;
}

impl SqlxDocumentRepo {
    pub fn new(pool: PgPool) -> Self {
        SqlxDocumentRepo { pool }
    }
}

async fn attached_images_tx(
    tx: &mut Transaction<'_, Postgres>,
    document_id: &Uuid,
) -> Result<Vec<AttachedImage>, AppError> {
    let attached = sqlx::query_as::<_, AttachedImage>(
        r#"
        SELECT di.id AS document_image_id, di.image_id, i.slug
        FROM document_images di
        JOIN images i ON i.id = di.image_id
        WHERE di.document_id = $1
        "#,
    )
    .bind(document_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(attached)
}

/// Deletes the given images and everything hanging off them, leaf-first.
async fn delete_images_tx(
    tx: &mut Transaction<'_, Postgres>,
    document_image_ids: &[Uuid],
    image_ids: &[Uuid],
) -> Result<(), AppError> {
    if image_ids.is_empty() {
        return Ok(());
    }

    sqlx::query("DELETE FROM image_variants WHERE image_id = ANY($1)")
        .bind(image_ids)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM document_images WHERE id = ANY($1)")
        .bind(document_image_ids)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM images WHERE id = ANY($1)")
        .bind(image_ids)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

#[async_trait]
impl DocumentRepository for SqlxDocumentRepo {
    async fn get_document(&self, id: &Uuid) -> Result<Document, AppError> {
        let document = sqlx::query_as::<_, Document>(
            r#"
            SELECT id, html, created_at, updated_at
            FROM documents
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".into()))?;

        Ok(document)
    }

    async fn list_attached_images(&self, document_id: &Uuid) -> Result<Vec<AttachedImage>, AppError> {
        let attached = sqlx::query_as::<_, AttachedImage>(
            r#"
            SELECT di.id AS document_image_id, di.image_id, i.slug
            FROM document_images di
            JOIN images i ON i.id = di.image_id
            WHERE di.document_id = $1
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attached)
    }

    async fn apply_content_update(
        &self,
        document_id: &Uuid,
        html: &str,
        new_images: &[NewImage],
        referenced_slugs: &HashSet<String>,
    ) -> Result<Document, AppError> {
        let mut tx = self.pool.begin().await?;

        let document = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (id, html)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
                SET html = EXCLUDED.html, updated_at = now()
            RETURNING id, html, created_at, updated_at
            "#,
        )
        .bind(document_id)
        .bind(html)
        .fetch_one(&mut *tx)
        .await?;

        // Sweep: anything attached before this edit but no longer cited in
        // the html produced by this same call is an orphan.
        let attached = attached_images_tx(&mut tx, document_id).await?;
        let (orphan_joins, orphan_images): (Vec<Uuid>, Vec<Uuid>) = attached
            .iter()
            .filter(|a| !referenced_slugs.contains(&a.slug))
            .map(|a| (a.document_image_id, a.image_id))
            .unzip();
        delete_images_tx(&mut tx, &orphan_joins, &orphan_images).await?;

        for image in new_images {
            let image_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO images (id, slug, file_name, mime_type, data, width, height)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&image.slug)
            .bind(&image.file_name)
            .bind(&image.mime_type)
            .bind(&image.data)
            .bind(image.width)
            .bind(image.height)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO document_images (id, document_id, image_id)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(document_id)
            .bind(image_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(document)
    }

    async fn delete_document(&self, id: &Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let attached = attached_images_tx(&mut tx, id).await?;
        let (joins, images): (Vec<Uuid>, Vec<Uuid>) = attached
            .iter()
            .map(|a| (a.document_image_id, a.image_id))
            .unzip();
        delete_images_tx(&mut tx, &joins, &images).await?;

        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Document not found".into()));
        }

        tx.commit().await?;

        Ok(())
    }
}
