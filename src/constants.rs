use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

pub static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// URL prefix under which stored images are served; the extractor rewrites
/// inline images to this form and recognizes it again on re-save.
pub const IMAGE_URL_PREFIX: &str = "/api/images/";

/// Upper bound for a single uploaded or embedded image (8 MiB).
pub const MAX_IMAGE_BYTES: u64 = 8 * 1024 * 1024;

/// Upper bound for a submitted rich-text body, inline images included (16 MiB).
pub const MAX_DOCUMENT_HTML_BYTES: u64 = 16 * 1024 * 1024;

/// Transcoding is the only slow step in the pipeline; a run exceeding this
/// is reported as transient and may be retried by the caller.
pub const TRANSCODE_TIMEOUT: Duration = Duration::from_secs(20);

/// JPEG quality used when a variant config does not specify one.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;
