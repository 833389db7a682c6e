use std::io::Cursor;

use derive_more::Display;
use image::codecs::gif::{GifDecoder, GifEncoder};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, Frame};

use crate::constants::DEFAULT_JPEG_QUALITY;
use crate::domain::entities::variant::{VariantConfig, VariantFamily, VariantName};

/// Computed rendition bytes plus the metadata stored alongside them.
#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Display)]
pub enum TranscodeError {
    #[display("Source image could not be decoded: {_0}")]
    UnreadableImage(String),

    #[display("Encoding failed: {_0}")]
    EncodingFailed(String),
}

/// Seam between the variant cache and the actual pixel work; the cache only
/// cares that the computation is deterministic per (source, variant).
pub trait Transcoder: Send + Sync {
    fn transcode(
        &self,
        source: &[u8],
        source_mime: &str,
        name: VariantName,
        config: &VariantConfig,
    ) -> Result<TranscodeOutput, TranscodeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
    Other,
}

impl SourceFormat {
    fn from_mime(mime: &str) -> Self {
        match mime.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => SourceFormat::Jpeg,
            "image/png" => SourceFormat::Png,
            "image/gif" => SourceFormat::Gif,
            "image/webp" => SourceFormat::WebP,
            _ => SourceFormat::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetFormat {
    Jpeg(u8),
    Png,
    Gif,
    WebP,
}

/// The format-selection table. Ordered, first match wins: the GIF-forced
/// family beats the inline-HTML family beats source-format defaults. GIF and
/// PNG sources stay GIF in inline contexts to keep losslessness/animation.
fn select_target(name: VariantName, config: &VariantConfig, source: SourceFormat) -> TargetFormat {
    let quality = config.quality.unwrap_or(DEFAULT_JPEG_QUALITY);
    match name.family() {
        VariantFamily::ForceGif => TargetFormat::Gif,
        VariantFamily::InlineHtml => match source {
            SourceFormat::Gif | SourceFormat::Png => TargetFormat::Gif,
            _ => TargetFormat::Jpeg(quality),
        },
        VariantFamily::Default => match source {
            SourceFormat::Jpeg => TargetFormat::Jpeg(quality),
            SourceFormat::Png => TargetFormat::Png,
            SourceFormat::WebP => TargetFormat::WebP,
            SourceFormat::Gif => TargetFormat::Gif,
            SourceFormat::Other => TargetFormat::Jpeg(DEFAULT_JPEG_QUALITY),
        },
    }
}

/// Production transcoder on top of the `image` codecs.
#[derive(Debug, Default)]
pub struct ImageTranscoder;

impl Transcoder for ImageTranscoder {
    fn transcode(
        &self,
        source: &[u8],
        source_mime: &str,
        name: VariantName,
        config: &VariantConfig,
    ) -> Result<TranscodeOutput, TranscodeError> {
        let source_format = SourceFormat::from_mime(source_mime);
        let target = select_target(name, config, source_format);

        if source_format == SourceFormat::Gif && target == TargetFormat::Gif {
            return gif_to_gif(source, config);
        }

        let img = image::load_from_memory(source)
            .map_err(|e| TranscodeError::UnreadableImage(e.to_string()))?;
        let img = scale_to_fit(img, config);
        encode(img, target)
    }
}

/// Fit-within target dimensions; identity when the source already fits
/// (variants never upscale).
fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let ratio = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let w = ((width as f64 * ratio) as u32).max(1);
    let h = ((height as f64 * ratio) as u32).max(1);
    (w, h)
}

fn scale_to_fit(img: DynamicImage, config: &VariantConfig) -> DynamicImage {
    let (tw, th) = fit_within(img.width(), img.height(), config.max_width, config.max_height);
    if (tw, th) == (img.width(), img.height()) {
        img
    } else {
        img.resize(tw, th, FilterType::Lanczos3)
    }
}

/// GIF in, GIF out. A source that already fits the bounds passes through
/// byte-identical, keeping animation and palette intact. Otherwise every
/// frame is scaled and the animation re-encoded.
fn gif_to_gif(source: &[u8], config: &VariantConfig) -> Result<TranscodeOutput, TranscodeError> {
    let probe = image::load_from_memory(source)
        .map_err(|e| TranscodeError::UnreadableImage(e.to_string()))?;
    let (width, height) = (probe.width(), probe.height());
    let (tw, th) = fit_within(width, height, config.max_width, config.max_height);

    if (tw, th) == (width, height) {
        return Ok(TranscodeOutput {
            data: source.to_vec(),
            mime_type: "image/gif".to_string(),
            width,
            height,
        });
    }

    let decoder = GifDecoder::new(Cursor::new(source))
        .map_err(|e| TranscodeError::UnreadableImage(e.to_string()))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| TranscodeError::UnreadableImage(e.to_string()))?;

    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        for frame in frames {
            let delay = frame.delay();
            let scaled = image::imageops::resize(frame.buffer(), tw, th, FilterType::Lanczos3);
            encoder
                .encode_frame(Frame::from_parts(scaled, 0, 0, delay))
                .map_err(|e| TranscodeError::EncodingFailed(e.to_string()))?;
        }
    }

    Ok(TranscodeOutput {
        data: buf,
        mime_type: "image/gif".to_string(),
        width: tw,
        height: th,
    })
}

fn encode(img: DynamicImage, target: TargetFormat) -> Result<TranscodeOutput, TranscodeError> {
    let (width, height) = (img.width(), img.height());
    let mut buf = Vec::new();

    let mime_type = match target {
        TargetFormat::Jpeg(quality) => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
                .map_err(|e| TranscodeError::EncodingFailed(e.to_string()))?;
            "image/jpeg"
        }
        TargetFormat::Png => {
            img.write_with_encoder(PngEncoder::new(&mut buf))
                .map_err(|e| TranscodeError::EncodingFailed(e.to_string()))?;
            "image/png"
        }
        TargetFormat::WebP => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut buf))
                .map_err(|e| TranscodeError::EncodingFailed(e.to_string()))?;
            "image/webp"
        }
        TargetFormat::Gif => {
            let frame = Frame::new(img.to_rgba8());
            let mut encoder = GifEncoder::new(&mut buf);
            encoder
                .encode_frame(frame)
                .map_err(|e| TranscodeError::EncodingFailed(e.to_string()))?;
            drop(encoder);
            "image/gif"
        }
    };

    Ok(TranscodeOutput {
        data: buf,
        mime_type: mime_type.to_string(),
        width,
        height,
    })
}
