//! Image-only HTML detection and `<img src="...">` URL collection.
//!
//! This is a forward-only substring scan, not an HTML tokenizer. Matching
//! is case-sensitive and only double-quoted `src` values are seen. Once a
//! `src="` or its closing quote cannot be found the scan ends, so an
//! unquoted or missing `src` hides every image after it that has none
//! either, and an `<img>` without `src` borrows the next tag's URL.

use crate::model::extraction::Extraction;

const IMG_OPEN: &str = "<img";
const SRC_ATTR: &str = "src=\"";

/// `true` when the markup has an image tag and no paragraph tag.
pub fn looks_image_only(html: &str) -> bool {
    html.contains(IMG_OPEN) && !html.contains("<p>")
}

/// Collect the `src` URLs of `<img` tags in document order, duplicates kept.
pub fn extract_image_srcs(html: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let mut start = 0;

    while let Some(img) = html[start..].find(IMG_OPEN) {
        let img_start = start + img;
        let Some(src) = html[img_start..].find(SRC_ATTR) else {
            break;
        };
        let url_start = img_start + src + SRC_ATTR.len();
        let Some(len) = html[url_start..].find('"') else {
            break;
        };
        let url_end = url_start + len;
        urls.push(html[url_start..url_end].to_string());
        start = url_end;
    }

    urls
}

/// Classify a top-level HTML body: image-only content becomes a URL list
/// (or the placeholder), everything else stays HTML.
pub fn classify_html(html: String) -> Extraction {
    if !looks_image_only(&html) {
        return Extraction::Html(html);
    }
    let urls = extract_image_srcs(&html);
    if urls.is_empty() {
        Extraction::ImageOnly
    } else {
        Extraction::ImageUrls(urls)
    }
}
