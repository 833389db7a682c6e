mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;

pub use domain::{entities, use_cases};
pub use interfaces::{handlers, repositories, routes};
pub use infrastructure::{db, utils};

use infrastructure::utils::transcode::ImageTranscoder;
use repositories::sqlx_repo::{SqlxDocumentRepo, SqlxImageRepo};
use use_cases::{documents::DocumentHandler, images::ImageHandler};

pub struct AppState {
    pub document_handler: AppDocumentHandler,
    pub image_handler: AppImageHandler,
}

pub type AppDocumentHandler = DocumentHandler<SqlxDocumentRepo>;
pub type AppImageHandler = ImageHandler<SqlxImageRepo, ImageTranscoder>;

impl AppState {
    pub fn new(pool: sqlx::PgPool) -> Self {
        let document_repo = SqlxDocumentRepo::new(pool.clone());
        let image_repo = SqlxImageRepo::new(pool);

        AppState {
            document_handler: DocumentHandler::new(document_repo),
            image_handler: ImageHandler::new(image_repo, ImageTranscoder),
        }
    }
}
