//! Result types of body extraction: the tagged payload, its tag and the
//! degradations recorded along the way.

use std::fmt;

/// Prefix attached to HTML bodies.
pub const HTML_PREFIX: &str = "[HTML] ";

/// Marker shared by both image-only renderings.
pub const IMAGE_MARKER: &str = "[Image-based";

/// Lead lines placed before the list of image URLs.
pub const IMAGE_URLS_LEAD: &str = "[Image-based mail]\nImage URLs:\n";

/// Rendering of an image-only body from which no URL could be recovered.
pub const IMAGE_ONLY_PLACEHOLDER: &str = "[Image-based body. Inspect it in a GUI mail client]";

/// Rendering of a multipart message with neither a plain nor an HTML part.
pub const MULTIPART_WITHOUT_TEXT: &str = "[Multipart: No plain or HTML body detected]";

/// Rendering of a message whose media type carries no displayable text.
pub const NO_BODY: &str = "[No Body]";

/// Rendering of a top-level body that could not be read.
pub const BODY_READ_ERROR: &str = "[Body Read Error]";

/// Primary content of a message. Exactly one form is ever produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A `text/plain` body, unprefixed.
    Plain(String),
    /// A `text/html` body, rendered with [`HTML_PREFIX`].
    Html(String),
    /// Image-only HTML: the `src` URLs in document order, duplicates kept.
    ImageUrls(Vec<String>),
    /// Image-only HTML without any recoverable `src` URL.
    ImageOnly,
    /// Multipart message without `text/plain` or `text/html` parts.
    MultipartWithoutText,
    /// Media type with no displayable text (or no Content-Type at all).
    NoBody,
    /// The top-level body stream failed while being read.
    ReadError,
}

impl Extraction {
    /// Render the single human-readable string for this result.
    pub fn text(&self) -> String {
        match self {
            Self::Plain(text) => text.clone(),
            Self::Html(html) => format!("{HTML_PREFIX}{html}"),
            Self::ImageUrls(urls) => format!("{IMAGE_URLS_LEAD}{}", urls.join("\n")),
            Self::ImageOnly => IMAGE_ONLY_PLACEHOLDER.to_string(),
            Self::MultipartWithoutText => MULTIPART_WITHOUT_TEXT.to_string(),
            Self::NoBody => NO_BODY.to_string(),
            Self::ReadError => BODY_READ_ERROR.to_string(),
        }
    }
}

impl fmt::Display for Extraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Short classification of an extraction result, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum BodyTag {
    #[serde(rename = "EMPTY")]
    Empty,
    #[serde(rename = "HTML")]
    Html,
    #[serde(rename = "IMG-ONLY")]
    ImgOnly,
    #[serde(rename = "MULTIPART")]
    Multipart,
    #[serde(rename = "PLAIN")]
    Plain,
}

impl BodyTag {
    /// Every tag, in display order.
    pub const ALL: [BodyTag; 5] = [
        BodyTag::Empty,
        BodyTag::Html,
        BodyTag::ImgOnly,
        BodyTag::Multipart,
        BodyTag::Plain,
    ];

    /// Bare tag name, e.g. `"IMG-ONLY"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Html => "HTML",
            Self::ImgOnly => "IMG-ONLY",
            Self::Multipart => "MULTIPART",
            Self::Plain => "PLAIN",
        }
    }
}

impl fmt::Display for BodyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.as_str())
    }
}

/// Something that went wrong during extraction without stopping it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// The entity has no Content-Type header.
    MissingContentType,
    /// The Content-Type value could not be fully parsed.
    MalformedContentType { value: String },
    /// Multipart traversal stopped before the close delimiter.
    IncompleteMultipart { parts_read: usize, reason: String },
    /// A body stream failed while being read.
    BodyReadFailed { error: String },
    /// A multipart message had no `text/plain` or `text/html` part.
    NoUsablePart { parts: usize },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingContentType => f.write_str("no Content-Type header"),
            Self::MalformedContentType { value } => {
                write!(f, "failed to parse Content-Type '{value}'")
            }
            Self::IncompleteMultipart { parts_read, reason } => write!(
                f,
                "multipart traversal incomplete after {parts_read} part(s): {reason}"
            ),
            Self::BodyReadFailed { error } => write!(f, "failed to read body: {error}"),
            Self::NoUsablePart { parts } => write!(
                f,
                "no usable part (text/plain or text/html) among {parts} part(s)"
            ),
        }
    }
}

/// What [`crate::extract::extract_primary_text`] returns: the content plus
/// the advisory notes the caller may want to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub extraction: Extraction,
    pub degradations: Vec<Degradation>,
}

impl Extracted {
    /// Rendered text of the extraction.
    pub fn text(&self) -> String {
        self.extraction.text()
    }

    /// Tag of the extraction.
    pub fn tag(&self) -> BodyTag {
        self.extraction.tag()
    }
}
