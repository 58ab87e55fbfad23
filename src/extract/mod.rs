//! Primary body extraction: chooses the one readable representation of a
//! message (plain text, HTML or an image-only marker).
//!
//! Nothing in here logs. Every problem is turned into a result plus a
//! [`Degradation`] note, and the caller decides what to record.

pub mod classify;
pub mod images;

use std::io::Read;

use crate::model::entity::Entity;
use crate::model::extraction::{Degradation, Extracted, Extraction};
use crate::parser::charset;
use crate::parser::content_type::{try_parse_content_type, ContentType, ContentTypeError};
use crate::parser::multipart;

pub use classify::classify_preview;

/// Extract the primary text of `entity`, consuming its body stream.
///
/// - `multipart/*`: the first `text/plain` part, else the first
///   `text/html` part, else [`Extraction::MultipartWithoutText`].
/// - `text/plain`: the body as-is.
/// - `text/html`: image-only markup becomes a URL list, the rest is HTML.
/// - anything else, including a missing Content-Type: [`Extraction::NoBody`].
pub fn extract_primary_text<R: Read>(entity: Entity<R>) -> Extracted {
    let (header, body) = entity.into_parts();
    let mut degradations = Vec::new();

    let content_type = resolve_content_type(header.get("content-type"), &mut degradations);

    let extraction = if content_type.is_multipart() {
        select_from_parts(body, &content_type, &mut degradations)
    } else if content_type.is("text/plain") || content_type.is("text/html") {
        select_single(body, &content_type, &mut degradations)
    } else {
        Extraction::NoBody
    };

    Extracted {
        extraction,
        degradations,
    }
}

fn resolve_content_type(value: Option<&str>, degradations: &mut Vec<Degradation>) -> ContentType {
    match try_parse_content_type(value.unwrap_or("")) {
        Ok(ct) => ct,
        Err(e) => {
            degradations.push(match &e {
                ContentTypeError::Missing => Degradation::MissingContentType,
                _ => Degradation::MalformedContentType {
                    value: value.unwrap_or("").to_string(),
                },
            });
            e.fallback()
        }
    }
}

fn select_from_parts<R: Read>(
    body: R,
    content_type: &ContentType,
    degradations: &mut Vec<Degradation>,
) -> Extraction {
    let walked = multipart::walk(body, content_type.boundary().unwrap_or(""));
    let total = walked.parts.len();
    if let Some(stop) = &walked.stop {
        degradations.push(Degradation::IncompleteMultipart {
            parts_read: total,
            reason: stop.to_string(),
        });
    }

    // Only the selected part's body is ever decoded
    let mut first_html = None;
    for part in walked.parts {
        let ct = part.content_type();
        if ct.is("text/plain") {
            return Extraction::Plain(part.into_text());
        }
        if first_html.is_none() && ct.is("text/html") {
            first_html = Some(part);
        }
    }

    match first_html {
        Some(part) => Extraction::Html(part.into_text()),
        None => {
            degradations.push(Degradation::NoUsablePart { parts: total });
            Extraction::MultipartWithoutText
        }
    }
}

fn select_single<R: Read>(
    mut body: R,
    content_type: &ContentType,
    degradations: &mut Vec<Degradation>,
) -> Extraction {
    let mut bytes = Vec::new();
    if let Err(e) = body.read_to_end(&mut bytes) {
        degradations.push(Degradation::BodyReadFailed {
            error: e.to_string(),
        });
        return Extraction::ReadError;
    }

    let text = charset::decode_text(bytes, content_type.charset());
    if content_type.is("text/html") {
        images::classify_html(text)
    } else {
        Extraction::Plain(text)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use super::*;
    use crate::model::entity::Header;
    use crate::model::extraction::BodyTag;

    fn entity(content_type: Option<&str>, body: &str) -> Entity<Cursor<Vec<u8>>> {
        let mut header = Header::default();
        header.push("Subject", "test");
        if let Some(ct) = content_type {
            header.push("Content-Type", ct);
        }
        Entity::new(header, Cursor::new(body.as_bytes().to_vec()))
    }

    #[test]
    fn test_plain_is_returned_verbatim() {
        let body = "Hello,\r\n\r\n  spaced  \r\n[HTML] not a tag\r\n";
        let out = extract_primary_text(entity(Some("text/plain; charset=utf-8"), body));
        assert_eq!(out.text(), body);
        assert_eq!(out.tag(), BodyTag::Plain);
        assert!(out.degradations.is_empty());
    }

    #[test]
    fn test_empty_plain_is_empty_tag() {
        let out = extract_primary_text(entity(Some("text/plain"), ""));
        assert_eq!(out.text(), "");
        assert_eq!(out.tag(), BodyTag::Empty);
    }

    #[test]
    fn test_html_with_paragraph_keeps_images() {
        let body = "<p>Hi</p><img src=\"http://a/1.png\">";
        let out = extract_primary_text(entity(Some("text/html"), body));
        assert_eq!(out.text(), format!("[HTML] {body}"));
        assert_eq!(out.tag(), BodyTag::Html);
    }

    #[test]
    fn test_image_only_html_lists_urls() {
        let body = "<img src=\"http://a/1.png\"><img src=\"http://a/2.png\">";
        let out = extract_primary_text(entity(Some("text/html"), body));
        assert_eq!(
            out.extraction,
            Extraction::ImageUrls(vec!["http://a/1.png".into(), "http://a/2.png".into()])
        );
        let text = out.text();
        let first = text.find("http://a/1.png").expect("first url");
        let second = text.find("http://a/2.png").expect("second url");
        assert!(first < second);
        assert_eq!(out.tag(), BodyTag::ImgOnly);
    }

    #[test]
    fn test_image_only_without_src_is_placeholder() {
        let out = extract_primary_text(entity(Some("text/html"), "<div><img alt=\"x\"></div>"));
        assert_eq!(out.extraction, Extraction::ImageOnly);
        assert_eq!(out.tag(), BodyTag::ImgOnly);
    }

    #[test]
    fn test_unknown_media_type_is_no_body() {
        let out = extract_primary_text(entity(Some("application/pdf"), "%PDF"));
        assert_eq!(out.extraction, Extraction::NoBody);
        assert_eq!(out.text(), "[No Body]");
        assert!(out.degradations.is_empty());
    }

    #[test]
    fn test_missing_content_type_is_no_body() {
        let out = extract_primary_text(entity(None, "hello"));
        assert_eq!(out.extraction, Extraction::NoBody);
        assert_eq!(out.degradations, [Degradation::MissingContentType]);
    }

    #[test]
    fn test_malformed_content_type_is_no_body() {
        let out = extract_primary_text(entity(Some("text"), "hello"));
        assert_eq!(out.extraction, Extraction::NoBody);
        assert_eq!(
            out.degradations,
            [Degradation::MalformedContentType {
                value: "text".into()
            }]
        );
    }

    #[test]
    fn test_bad_params_keep_text_plain() {
        let out = extract_primary_text(entity(Some("text/plain; charset"), "still here"));
        assert_eq!(out.text(), "still here");
        assert_eq!(out.degradations.len(), 1);
    }

    #[test]
    fn test_repeated_param_is_no_body() {
        let value = "text/plain; charset=utf-8; Charset=latin1";
        let out = extract_primary_text(entity(Some(value), "hello"));
        assert_eq!(out.extraction, Extraction::NoBody);
        assert_eq!(
            out.degradations,
            [Degradation::MalformedContentType {
                value: value.into()
            }]
        );
    }

    #[test]
    fn test_multipart_prefers_plain_over_earlier_html() {
        let body = "--XYZ\r\nContent-Type: text/html\r\n\r\n<p>hi</p>\r\n\
                    --XYZ\r\nContent-Type: text/plain\r\n\r\nhello\r\n--XYZ--\r\n";
        let out = extract_primary_text(entity(Some("multipart/mixed; boundary=XYZ"), body));
        assert_eq!(out.text(), "hello");
        assert_eq!(out.tag(), BodyTag::Plain);
        assert!(out.degradations.is_empty());
    }

    #[test]
    fn test_multipart_first_plain_wins() {
        let body = "--b\r\nContent-Type: text/plain\r\n\r\none\r\n\
                    --b\r\nContent-Type: text/plain\r\n\r\ntwo\r\n--b--\r\n";
        let out = extract_primary_text(entity(Some("multipart/alternative; boundary=b"), body));
        assert_eq!(out.text(), "one");
    }

    #[test]
    fn test_multipart_html_only() {
        let body = "--b\r\nContent-Type: text/html\r\n\r\n<img src=\"x\">\r\n--b--\r\n";
        let out = extract_primary_text(entity(Some("multipart/related; boundary=b"), body));
        // No image gate for multipart HTML
        assert_eq!(out.text(), "[HTML] <img src=\"x\">");
        assert_eq!(out.tag(), BodyTag::Html);
    }

    #[test]
    fn test_multipart_first_html_wins() {
        let body = "--b\r\nContent-Type: text/html\r\n\r\n<i>1</i>\r\n\
                    --b\r\nContent-Type: text/html\r\n\r\n<i>2</i>\r\n--b--\r\n";
        let out = extract_primary_text(entity(Some("multipart/alternative; boundary=b"), body));
        assert_eq!(out.text(), "[HTML] <i>1</i>");
    }

    #[test]
    fn test_multipart_without_text_parts() {
        let body = "--b\r\nContent-Type: image/png\r\n\r\nPNG\r\n\
                    --b\r\nContent-Type: application/pdf\r\n\r\nPDF\r\n--b--\r\n";
        let out = extract_primary_text(entity(Some("multipart/mixed; boundary=b"), body));
        assert_eq!(out.text(), "[Multipart: No plain or HTML body detected]");
        assert_eq!(out.tag(), BodyTag::Multipart);
        assert_eq!(classify_preview(&out.text()), BodyTag::Multipart);
        assert_eq!(out.degradations, [Degradation::NoUsablePart { parts: 2 }]);
    }

    #[test]
    fn test_nested_multipart_is_skipped() {
        let body = "--outer\r\nContent-Type: multipart/alternative; boundary=inner\r\n\r\n\
                    --inner\r\nContent-Type: text/plain\r\n\r\nnested\r\n--inner--\r\n\
                    --outer\r\nContent-Type: text/html\r\n\r\n<b>top</b>\r\n--outer--\r\n";
        let out = extract_primary_text(entity(Some("multipart/mixed; boundary=outer"), body));
        assert_eq!(out.text(), "[HTML] <b>top</b>");
    }

    #[test]
    fn test_multipart_missing_boundary() {
        let out = extract_primary_text(entity(Some("multipart/mixed"), "--x\r\n\r\nhi\r\n--x--"));
        assert_eq!(out.extraction, Extraction::MultipartWithoutText);
        assert!(matches!(
            out.degradations[0],
            Degradation::IncompleteMultipart { parts_read: 0, .. }
        ));
    }

    #[test]
    fn test_multipart_truncated_still_selects_earlier_part() {
        let body = "--b\r\nContent-Type: text/html\r\n\r\n<b>kept</b>\r\n\
                    --b\r\nContent-Type: text/plain\r\n\r\nnever closed";
        let out = extract_primary_text(entity(Some("multipart/mixed; boundary=b"), body));
        assert_eq!(out.text(), "[HTML] <b>kept</b>");
        assert!(matches!(
            out.degradations[0],
            Degradation::IncompleteMultipart { parts_read: 1, .. }
        ));
    }

    #[test]
    fn test_part_charset_is_honoured() {
        let mut body = b"--b\r\nContent-Type: text/plain; charset=euc-kr\r\n\r\n".to_vec();
        body.extend_from_slice(&[0xC7, 0xD1]);
        body.extend_from_slice(b"\r\n--b--\r\n");
        let header = Header::from_pairs([("Content-Type", "multipart/mixed; boundary=b")]);
        let out = extract_primary_text(Entity::new(header, Cursor::new(body)));
        assert_eq!(out.text(), "한");
    }

    struct BrokenBody;

    impl Read for BrokenBody {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "stalled"))
        }
    }

    #[test]
    fn test_read_failure_is_read_error_sentinel() {
        let header = Header::from_pairs([("Content-Type", "text/plain")]);
        let out = extract_primary_text(Entity::new(header, BrokenBody));
        assert_eq!(out.extraction, Extraction::ReadError);
        assert_eq!(out.text(), "[Body Read Error]");
        assert!(matches!(
            out.degradations[0],
            Degradation::BodyReadFailed { .. }
        ));
    }

    #[test]
    fn test_read_failure_in_multipart_is_not_fatal() {
        let header = Header::from_pairs([("Content-Type", "multipart/mixed; boundary=b")]);
        let out = extract_primary_text(Entity::new(header, BrokenBody));
        assert_eq!(out.extraction, Extraction::MultipartWithoutText);
        assert_eq!(out.degradations.len(), 2);
    }
}
