use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::errors::AppError;

/// Named renditions a caller may request for any stored image. The set is
/// deployed configuration, never user data; an unknown name is rejected
/// before any lookup happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantName {
    Thumbnail,
    Small,
    Medium,
    Large,
    Html,
    HtmlThumb,
    Gif,
}

/// Resize bounds and optional encoder quality for one variant.
#[derive(Debug, Clone, Copy)]
pub struct VariantConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: Option<u8>,
}

/// Output-format families. Precedence lives in the transcoder: the GIF
/// family always wins, the inline-HTML family wins over source-format
/// defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantFamily {
    ForceGif,
    InlineHtml,
    Default,
}

impl VariantName {
    pub const ALL: [VariantName; 7] = [
        VariantName::Thumbnail,
        VariantName::Small,
        VariantName::Medium,
        VariantName::Large,
        VariantName::Html,
        VariantName::HtmlThumb,
        VariantName::Gif,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VariantName::Thumbnail => "thumbnail",
            VariantName::Small => "small",
            VariantName::Medium => "medium",
            VariantName::Large => "large",
            VariantName::Html => "html",
            VariantName::HtmlThumb => "htmlthumb",
            VariantName::Gif => "gif",
        }
    }

    pub fn config(&self) -> VariantConfig {
        match self {
            VariantName::Thumbnail => VariantConfig { max_width: 150, max_height: 150, quality: None },
            VariantName::Small => VariantConfig { max_width: 320, max_height: 240, quality: None },
            VariantName::Medium => VariantConfig { max_width: 640, max_height: 480, quality: None },
            VariantName::Large => VariantConfig { max_width: 1280, max_height: 960, quality: None },
            VariantName::Html => VariantConfig { max_width: 800, max_height: 600, quality: Some(90) },
            VariantName::HtmlThumb => VariantConfig { max_width: 150, max_height: 150, quality: Some(90) },
            VariantName::Gif => VariantConfig { max_width: 640, max_height: 480, quality: None },
        }
    }

    pub fn family(&self) -> VariantFamily {
        match self {
            VariantName::Gif => VariantFamily::ForceGif,
            VariantName::Html | VariantName::HtmlThumb => VariantFamily::InlineHtml,
            _ => VariantFamily::Default,
        }
    }
}

impl fmt::Display for VariantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VariantName::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown image variant: {}", s)))
    }
}
