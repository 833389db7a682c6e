use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::constants::IMAGE_URL_PREFIX;
use crate::domain::entities::image::NewImage;
use crate::infrastructure::utils::sanitize::{rich_text_allow_list, sanitize};

/// Inline image payload: `data:<mime>;base64,<payload>`, mime restricted to
/// the image/* space. Anything else in a data: src is left alone.
static DATA_URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:(image/[a-zA-Z0-9.+-]+);base64,([A-Za-z0-9+/=\s]+)$")
        .expect("data URI regex")
});

/// An already-extracted reference: `/api/images/{slug}`, nothing trailing.
static IMAGE_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/api/images/([A-Za-z0-9_-]+)$").expect("image ref regex")
});

/// Result of running the sanitize-and-extract pipeline over one submitted
/// body: storable html, the images minted from inline payloads, and every
/// slug the html now cites (new ones included).
#[derive(Debug)]
pub struct ExtractedContent {
    pub html: String,
    pub new_images: Vec<NewImage>,
    pub referenced_slugs: HashSet<String>,
}

/// Sanitizes `html` and materializes its inline images.
///
/// Each `<img>` with a base64 data URI becomes a fresh `NewImage` with its
/// own slug — occurrences are never shared, even for identical payloads —
/// and its src is rewritten to `/api/images/{slug}`. Existing
/// `/api/images/{slug}` references are recorded untouched. Any other src is
/// neither tracked nor modified. A payload that fails to decode is skipped
/// silently: the tag keeps its unusable src and the edit still succeeds.
pub fn extract_content(html: &str) -> ExtractedContent {
    let clean = sanitize(html, &rich_text_allow_list());

    let mut new_images: Vec<NewImage> = Vec::new();
    let mut referenced_slugs: HashSet<String> = HashSet::new();
    // (old tag, new tag) pairs in document order, applied one occurrence at
    // a time so duplicate payloads each keep their own slug.
    let mut rewrites: Vec<(String, String)> = Vec::new();

    let tags = match img_tags(&clean) {
        Some(tags) => tags,
        None => {
            // tl only fails on pathological nesting; the sanitized body is
            // still safe to store as-is.
            debug!("HTML tree parse failed, storing without extraction");
            return ExtractedContent { html: clean, new_images, referenced_slugs };
        }
    };

    for tag in tags {
        if let Some(captures) = DATA_URI_RE.captures(&tag.src) {
            let mime_type = captures[1].to_ascii_lowercase();
            let payload: String = captures[2].chars().filter(|c| !c.is_whitespace()).collect();

            let data = match BASE64.decode(payload.as_bytes()) {
                Ok(data) if !data.is_empty() => data,
                _ => {
                    debug!("Skipping inline image with undecodable base64 payload");
                    continue;
                }
            };

            let slug = NewImage::generate_slug();
            let (width, height) = probe_dimensions(&data);
            let file_name = synthesize_file_name(&slug, &mime_type);

            let old_attr = format!("src=\"{}\"", tag.src);
            let new_attr = format!("src=\"{}{}\"", IMAGE_URL_PREFIX, slug);
            rewrites.push((tag.raw.clone(), tag.raw.replacen(&old_attr, &new_attr, 1)));
            referenced_slugs.insert(slug.clone());
            new_images.push(NewImage {
                slug,
                file_name,
                mime_type,
                data,
                width,
                height,
            });
        } else if let Some(captures) = IMAGE_REF_RE.captures(&tag.src) {
            referenced_slugs.insert(captures[1].to_string());
        }
    }

    // The needle is the whole serialized tag, not the bare attribute: the
    // sanitizer escapes `<` in text and `"` in attribute values, so the
    // needle cannot match a textual copy of the URI elsewhere in the body.
    let mut html = clean;
    for (old_tag, new_tag) in rewrites {
        html = html.replacen(&old_tag, &new_tag, 1);
    }

    ExtractedContent { html, new_images, referenced_slugs }
}

struct ImgTag {
    raw: String,
    src: String,
}

/// Every `<img>` with a src, in document order, as (serialized tag, src
/// value). None when the tree parser rejects the input.
fn img_tags(html: &str) -> Option<Vec<ImgTag>> {
    let dom = tl::parse(html, tl::ParserOptions::default()).ok()?;
    let mut tags = Vec::new();
    for node in dom.nodes() {
        let Some(tag) = node.as_tag() else { continue };
        if tag.name().as_utf8_str() != "img" {
            continue;
        }
        if let Some(Some(src)) = tag.attributes().get("src") {
            tags.push(ImgTag {
                raw: tag.raw().as_utf8_str().into_owned(),
                src: src.as_utf8_str().into_owned(),
            });
        }
    }
    Some(tags)
}

/// Width/height of the decoded payload; (0, 0) when the bytes are not a
/// decodable raster image. Such images still get stored — the failure
/// surfaces later, on variant generation, without blocking the edit.
fn probe_dimensions(data: &[u8]) -> (i32, i32) {
    match image::load_from_memory(data) {
        Ok(img) => (img.width() as i32, img.height() as i32),
        Err(_) => (0, 0),
    }
}

fn synthesize_file_name(slug: &str, mime_type: &str) -> String {
    let subtype = mime_type.split('/').nth(1).unwrap_or("bin");
    let ext: String = subtype
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    let ext = if ext.is_empty() { "bin".to_string() } else { ext };
    format!("embedded-{}.{}", &slug[..slug.len().min(8)], ext)
}
