use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    constants::TRANSCODE_TIMEOUT,
    entities::image::{Image, ImageUploadRequest, ImageVariant, NewImage, NewImageVariant},
    entities::variant::VariantName,
    errors::AppError,
    infrastructure::utils::transcode::Transcoder,
    repositories::image::ImageRepository,
};

/// Serves stored images and their lazily computed renditions. Variant
/// computation is guarded twice against the find-then-create race: an
/// in-process per-key mutex so concurrent requests share one computation,
/// and insert-or-ignore semantics in the repository underneath.
pub struct ImageHandler<R, T>
where
    R: ImageRepository,
    T: Transcoder + 'static,
{
    pub image_repo: R,
    transcoder: Arc<T>,
    transcode_timeout: Duration,
    variant_locks: DashMap<(Uuid, VariantName), Arc<Mutex<()>>>,
}

impl<R, T> ImageHandler<R, T>
where
    R: ImageRepository,
    T: Transcoder + 'static,
{
    pub fn new(image_repo: R, transcoder: T) -> Self {
        Self::with_timeout(image_repo, transcoder, TRANSCODE_TIMEOUT)
    }

    /// `transcode_timeout` bounds a single variant computation.
    pub fn with_timeout(image_repo: R, transcoder: T, transcode_timeout: Duration) -> Self {
        ImageHandler {
            image_repo,
            transcoder: Arc::new(transcoder),
            transcode_timeout,
            variant_locks: DashMap::new(),
        }
    }

    pub async fn get_image_by_slug(&self, slug: &str) -> Result<Image, AppError> {
        self.image_repo.get_image_by_slug(slug).await
    }

    /// Stores a directly uploaded image. Mime type is sniffed from the
    /// bytes, never trusted from the client.
    pub async fn upload_image(&self, request: ImageUploadRequest) -> Result<Image, AppError> {
        request.validate()?;

        let mime_type = infer::get(&request.file_data)
            .map(|kind| kind.mime_type().to_string())
            .filter(|mime| mime.starts_with("image/"))
            .ok_or_else(|| AppError::InvalidInput("Uploaded file is not a recognized image".into()))?;

        let (width, height) = match image::load_from_memory(&request.file_data) {
            Ok(img) => (img.width() as i32, img.height() as i32),
            Err(_) => (0, 0),
        };

        let new_image = NewImage {
            slug: NewImage::generate_slug(),
            file_name: request.file_name,
            mime_type,
            data: request.file_data,
            width,
            height,
        };

        self.image_repo.create_image(&new_image).await
    }

    /// Returns the named rendition of `image`, computing and persisting it
    /// on first request. Cache hits never invoke the transcoder.
    pub async fn ensure_variant(&self, image: &Image, name: VariantName) -> Result<ImageVariant, AppError> {
        if let Some(variant) = self.image_repo.find_variant(&image.id, name).await? {
            return Ok(variant);
        }

        let key = (image.id, name);
        let lock = self
            .variant_locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-check: a racing request may have filled the cache while we
        // waited on the key lock.
        if let Some(variant) = self.image_repo.find_variant(&image.id, name).await? {
            return Ok(variant);
        }

        debug!(image_id = %image.id, variant = %name, "computing image variant");

        let transcoder = Arc::clone(&self.transcoder);
        let data = image.data.clone();
        let mime_type = image.mime_type.clone();
        let output = tokio::time::timeout(
            self.transcode_timeout,
            tokio::task::spawn_blocking(move || {
                transcoder.transcode(&data, &mime_type, name, &name.config())
            }),
        )
        .await
        .map_err(|_| {
            warn!(image_id = %image.id, variant = %name, "transcode timed out");
            AppError::Transient("Image processing timed out".into())
        })?
        .map_err(|e| AppError::InternalError(format!("Transcode task failed: {}", e)))??;

        let variant = self
            .image_repo
            .insert_variant(&NewImageVariant {
                image_id: image.id,
                variant_name: name,
                mime_type: output.mime_type,
                data: output.data,
                width: output.width as i32,
                height: output.height as i32,
            })
            .await?;

        // Late arrivals holding the Arc still re-check the repository, so
        // the entry can go as soon as the row exists.
        self.variant_locks.remove(&key);

        Ok(variant)
    }
}
