#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use image::{DynamicImage, ImageFormat, RgbImage};
use parking_lot::Mutex;
use uuid::Uuid;

use catalog_backend::constants::TRANSCODE_TIMEOUT;
use catalog_backend::entities::document::{AttachedImage, Document};
use catalog_backend::entities::image::{Image, ImageVariant, NewImage, NewImageVariant};
use catalog_backend::entities::variant::{VariantConfig, VariantName};
use catalog_backend::errors::AppError;
use catalog_backend::repositories::document::DocumentRepository;
use catalog_backend::repositories::image::ImageRepository;
use catalog_backend::use_cases::documents::DocumentHandler;
use catalog_backend::use_cases::images::ImageHandler;
use catalog_backend::utils::transcode::{
    ImageTranscoder, TranscodeError, TranscodeOutput, Transcoder,
};

// ───── In-memory repository fake ─────────────────────────────────────
//
// One store behind one mutex: every repository call is atomic, matching
// the transactional guarantees of the Postgres implementation.

#[derive(Default)]
struct Store {
    documents: HashMap<Uuid, Document>,
    images: HashMap<Uuid, Image>,
    // join id -> (document_id, image_id)
    document_images: HashMap<Uuid, (Uuid, Uuid)>,
    variants: HashMap<(Uuid, String), ImageVariant>,
}

#[derive(Clone, Default)]
pub struct InMemoryRepo {
    store: Arc<Mutex<Store>>,
}

impl InMemoryRepo {
    pub fn image_count(&self) -> usize {
        self.store.lock().images.len()
    }

    pub fn variant_count(&self) -> usize {
        self.store.lock().variants.len()
    }
}

#[async_trait]
impl ImageRepository for InMemoryRepo {
    async fn create_image(&self, image: &NewImage) -> Result<Image, AppError> {
        let mut store = self.store.lock();
        if store.images.values().any(|i| i.slug == image.slug) {
            return Err(AppError::Conflict("Image slug already exists".into()));
        }
        let created = Image {
            id: Uuid::new_v4(),
            slug: image.slug.clone(),
            file_name: image.file_name.clone(),
            mime_type: image.mime_type.clone(),
            data: image.data.clone(),
            width: image.width,
            height: image.height,
            created_at: Utc::now(),
        };
        store.images.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_image_by_slug(&self, slug: &str) -> Result<Image, AppError> {
        self.store
            .lock()
            .images
            .values()
            .find(|i| i.slug == slug)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Image not found".into()))
    }

    async fn find_variant(
        &self,
        image_id: &Uuid,
        name: VariantName,
    ) -> Result<Option<ImageVariant>, AppError> {
        Ok(self
            .store
            .lock()
            .variants
            .get(&(*image_id, name.as_str().to_string()))
            .cloned())
    }

    async fn insert_variant(&self, variant: &NewImageVariant) -> Result<ImageVariant, AppError> {
        let mut store = self.store.lock();
        let key = (variant.image_id, variant.variant_name.as_str().to_string());
        // insert-or-ignore, then read back: the first writer wins
        let entry = store.variants.entry(key).or_insert_with(|| ImageVariant {
            id: Uuid::new_v4(),
            image_id: variant.image_id,
            variant_name: variant.variant_name.as_str().to_string(),
            mime_type: variant.mime_type.clone(),
            data: variant.data.clone(),
            width: variant.width,
            height: variant.height,
            created_at: Utc::now(),
        });
        Ok(entry.clone())
    }

    async fn check_connection(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl DocumentRepository for InMemoryRepo {
    async fn get_document(&self, id: &Uuid) -> Result<Document, AppError> {
        self.store
            .lock()
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Document not found".into()))
    }

    async fn list_attached_images(&self, document_id: &Uuid) -> Result<Vec<AttachedImage>, AppError> {
        let store = self.store.lock();
        Ok(store
            .document_images
            .iter()
            .filter(|(_, (doc_id, _))| doc_id == document_id)
            .map(|(join_id, (_, image_id))| AttachedImage {
                document_image_id: *join_id,
                image_id: *image_id,
                slug: store.images[image_id].slug.clone(),
            })
            .collect())
    }

    async fn apply_content_update(
        &self,
        document_id: &Uuid,
        html: &str,
        new_images: &[NewImage],
        referenced_slugs: &HashSet<String>,
    ) -> Result<Document, AppError> {
        let mut store = self.store.lock();

        let now = Utc::now();
        let document = store
            .documents
            .entry(*document_id)
            .and_modify(|d| {
                d.html = Some(html.to_string());
                d.updated_at = now;
            })
            .or_insert_with(|| Document {
                id: *document_id,
                html: Some(html.to_string()),
                created_at: now,
                updated_at: now,
            })
            .clone();

        // sweep orphans: join -> variants -> image
        let orphans: Vec<(Uuid, Uuid)> = store
            .document_images
            .iter()
            .filter(|(_, (doc_id, image_id))| {
                doc_id == document_id && !referenced_slugs.contains(&store.images[image_id].slug)
            })
            .map(|(join_id, (_, image_id))| (*join_id, *image_id))
            .collect();
        for (join_id, image_id) in orphans {
            store.variants.retain(|(img, _), _| *img != image_id);
            store.document_images.remove(&join_id);
            store.images.remove(&image_id);
        }

        for image in new_images {
            let created = Image {
                id: Uuid::new_v4(),
                slug: image.slug.clone(),
                file_name: image.file_name.clone(),
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
                width: image.width,
                height: image.height,
                created_at: now,
            };
            store
                .document_images
                .insert(Uuid::new_v4(), (*document_id, created.id));
            store.images.insert(created.id, created);
        }

        Ok(document)
    }

    async fn delete_document(&self, id: &Uuid) -> Result<(), AppError> {
        let mut store = self.store.lock();
        if store.documents.remove(id).is_none() {
            return Err(AppError::NotFound("Document not found".into()));
        }
        let owned: Vec<(Uuid, Uuid)> = store
            .document_images
            .iter()
            .filter(|(_, (doc_id, _))| doc_id == id)
            .map(|(join_id, (_, image_id))| (*join_id, *image_id))
            .collect();
        for (join_id, image_id) in owned {
            store.variants.retain(|(img, _), _| *img != image_id);
            store.document_images.remove(&join_id);
            store.images.remove(&image_id);
        }
        Ok(())
    }
}

// ───── Instrumented transcoder ───────────────────────────────────────

pub struct CountingTranscoder {
    inner: ImageTranscoder,
    calls: Arc<AtomicUsize>,
    // consumed by the first call only, so a stalled first attempt can be
    // followed by a fast retry
    delay: Mutex<Option<Duration>>,
}

impl Transcoder for CountingTranscoder {
    fn transcode(
        &self,
        source: &[u8],
        source_mime: &str,
        name: VariantName,
        config: &VariantConfig,
    ) -> Result<TranscodeOutput, TranscodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay.lock().take();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.inner.transcode(source, source_mime, name, config)
    }
}

// ───── Wiring ────────────────────────────────────────────────────────

pub struct TestApp {
    pub repo: InMemoryRepo,
    pub documents: DocumentHandler<InMemoryRepo>,
    pub images: Arc<ImageHandler<InMemoryRepo, CountingTranscoder>>,
    pub transcode_calls: Arc<AtomicUsize>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::build(None, TRANSCODE_TIMEOUT)
    }

    /// `delay` stalls the first transcode call, widening the cache-fill
    /// race window for concurrency tests.
    pub fn with_transcode_delay(delay: Option<Duration>) -> Self {
        Self::build(delay, TRANSCODE_TIMEOUT)
    }

    /// A first transcode call stalled past `timeout`.
    pub fn with_transcode_timeout(delay: Duration, timeout: Duration) -> Self {
        Self::build(Some(delay), timeout)
    }

    fn build(delay: Option<Duration>, timeout: Duration) -> Self {
        let repo = InMemoryRepo::default();
        let transcode_calls = Arc::new(AtomicUsize::new(0));
        let transcoder = CountingTranscoder {
            inner: ImageTranscoder,
            calls: Arc::clone(&transcode_calls),
            delay: Mutex::new(delay),
        };

        TestApp {
            repo: repo.clone(),
            documents: DocumentHandler::new(repo.clone()),
            images: Arc::new(ImageHandler::with_timeout(repo, transcoder, timeout)),
            transcode_calls,
        }
    }
}

// ───── Fixture images ────────────────────────────────────────────────

pub fn raster(w: u32, h: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 77])
    }))
}

pub fn encoded_image(w: u32, h: u32, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    raster(w, h).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn png_data_uri(w: u32, h: u32) -> String {
    format!(
        "data:image/png;base64,{}",
        BASE64.encode(encoded_image(w, h, ImageFormat::Png))
    )
}
