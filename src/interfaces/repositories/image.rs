use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    entities::image::{Image, ImageVariant, NewImage, NewImageVariant},
    entities::variant::VariantName,
    errors::AppError,
    repositories::sqlx_repo::SqlxImageRepo,
};

#[async_trait]
pub trait ImageRepository: Sync + Send {
    async fn create_image(&self, image: &NewImage) -> Result<Image, AppError>;
    async fn get_image_by_slug(&self, slug: &str) -> Result<Image, AppError>;
    /// Cache lookup; `None` is a miss, not an error.
    async fn find_variant(&self, image_id: &Uuid, name: VariantName) -> Result<Option<ImageVariant>, AppError>;
    /// Insert-or-ignore on the `(image_id, variant_name)` uniqueness, then
    /// re-read. Two racing writers both end up observing the winning row.
    async fn insert_variant(&self, variant: &NewImageVariant) -> Result<ImageVariant, AppError>;
    async fn check_connection(&self) -> Result<(), AppError>;
}

impl SqlxImageRepo {
    pub fn new(pool: PgPool) -> Self {
        SqlxImageRepo { pool }
    }
}

#[async_trait]
impl ImageRepository for SqlxImageRepo {
    async fn create_image(&self, image: &NewImage) -> Result<Image, AppError> {
        let created = sqlx::query_as::<_, Image>(
            r#"
            INSERT INTO images (id, slug, file_name, mime_type, data, width, height)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, slug, file_name, mime_type, data, width, height, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&image.slug)
        .bind(&image.file_name)
        .bind(&image.mime_type)
        .bind(&image.data)
        .bind(image.width)
        .bind(image.height)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("images_slug_key") {
                    return AppError::Conflict("Image slug already exists".into());
                }
            }
            AppError::from(e)
        })?;

        Ok(created)
    }

    async fn get_image_by_slug(&self, slug: &str) -> Result<Image, AppError> {
        let image = sqlx::query_as::<_, Image>(
            r#"
            SELECT id, slug, file_name, mime_type, data, width, height, created_at
            FROM images
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".into()))?;

        Ok(image)
    }

    async fn find_variant(&self, image_id: &Uuid, name: VariantName) -> Result<Option<ImageVariant>, AppError> {
        let variant = sqlx::query_as::<_, ImageVariant>(
            r#"
            SELECT id, image_id, variant_name, mime_type, data, width, height, created_at
            FROM image_variants
            WHERE image_id = $1 AND variant_name = $2
            "#,
        )
        .bind(image_id)
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }

    async fn insert_variant(&self, variant: &NewImageVariant) -> Result<ImageVariant, AppError> {
        sqlx::query(
            r#"
            INSERT INTO image_variants (id, image_id, variant_name, mime_type, data, width, height)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (image_id, variant_name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(variant.image_id)
        .bind(variant.variant_name.as_str())
        .bind(&variant.mime_type)
        .bind(&variant.data)
        .bind(variant.width)
        .bind(variant.height)
        .execute(&self.pool)
        .await?;

        // Re-read regardless of whether our insert won the race.
        self.find_variant(&variant.image_id, variant.variant_name)
            .await?
            .ok_or_else(|| AppError::InternalError("Variant vanished after insert".into()))
    }

    async fn check_connection(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
