//! Body tags for logging.

use crate::model::extraction::{
    BodyTag, Extraction, HTML_PREFIX, IMAGE_MARKER, MULTIPART_WITHOUT_TEXT,
};

impl Extraction {
    /// Tag of this result. `NoBody` and `ReadError` count as plain text.
    pub fn tag(&self) -> BodyTag {
        match self {
            Self::Plain(text) if text.is_empty() => BodyTag::Empty,
            Self::Plain(_) | Self::NoBody | Self::ReadError => BodyTag::Plain,
            Self::Html(_) => BodyTag::Html,
            Self::ImageUrls(_) | Self::ImageOnly => BodyTag::ImgOnly,
            Self::MultipartWithoutText => BodyTag::Multipart,
        }
    }
}

/// Tag free-form preview text by its leading marker.
///
/// First match wins: empty, `[HTML]`, `[Image-based`, `[Multipart`, else plain.
/// Prefer [`Extraction::tag`] when the result itself is at hand.
pub fn classify_preview(text: &str) -> BodyTag {
    if text.is_empty() {
        BodyTag::Empty
    } else if text.starts_with(HTML_PREFIX.trim_end()) {
        BodyTag::Html
    } else if text.starts_with(IMAGE_MARKER) {
        BodyTag::ImgOnly
    } else if text.starts_with(multipart_marker()) {
        BodyTag::Multipart
    } else {
        BodyTag::Plain
    }
}

/// `"[Multipart"`, the part of the sentinel before the colon.
fn multipart_marker() -> &'static str {
    MULTIPART_WITHOUT_TEXT
        .split_once(':')
        .map_or(MULTIPART_WITHOUT_TEXT, |(marker, _)| marker)
}
