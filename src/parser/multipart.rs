//! One-level multipart splitting (RFC 2046 §5.1 framing).
//!
//! The whole body is read up front and split into an ordered list of
//! parts, so the selector can look at every part before choosing one.
//! Nested multipart parts are returned as-is, never split further.

use std::io::Read;

use crate::model::entity::Header;
use crate::parser::charset;
use crate::parser::content_type::{parse_content_type, ContentType};
use crate::parser::header::parse_header_block;

/// One sub-part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    header: Header,
    content_type: ContentType,
    body: Vec<u8>,
}

impl BodyPart {
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The part's own resolved Content-Type.
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Consume the part and return its raw body bytes.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Consume the part and return its body as text (see [`charset::decode_text`]).
    pub fn into_text(self) -> String {
        let Self {
            content_type, body, ..
        } = self;
        charset::decode_text(body, content_type.charset())
    }
}

/// Why traversal ended before the close delimiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalkStop {
    #[error("no boundary parameter")]
    MissingBoundary,
    #[error("boundary delimiter never found")]
    NoDelimiter,
    #[error("part header block cut off")]
    UnterminatedHeaders,
    #[error("stream ended inside a part")]
    Truncated,
    #[error("body stream failed: {0}")]
    Read(String),
}

/// The parts read from a multipart body, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    pub parts: Vec<BodyPart>,
    /// `None` when the close delimiter was reached.
    pub stop: Option<WalkStop>,
}

impl MultipartBody {
    pub fn is_complete(&self) -> bool {
        self.stop.is_none()
    }
}

/// Read `body` to the end and split it on `boundary`.
///
/// Never fails: problems stop the walk early and are recorded in
/// [`MultipartBody::stop`], keeping every part completed before them.
pub fn walk<R: Read>(mut body: R, boundary: &str) -> MultipartBody {
    if boundary.is_empty() {
        return MultipartBody {
            parts: Vec::new(),
            stop: Some(WalkStop::MissingBoundary),
        };
    }

    // read_to_end keeps the bytes received before a failure
    let mut data = Vec::new();
    let read_error = body.read_to_end(&mut data).err();

    let mut walked = split(&data, boundary);
    if let Some(e) = read_error {
        if !walked.is_complete() {
            walked.stop = Some(WalkStop::Read(e.to_string()));
        }
    }
    walked
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Open,
    Close,
}

struct Line<'a> {
    /// Offset of the first byte of the line.
    start: usize,
    /// The line without its CRLF / LF terminator.
    content: &'a [u8],
}

fn lines(data: &[u8]) -> impl Iterator<Item = Line<'_>> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        if pos >= data.len() {
            return None;
        }
        let start = pos;
        pos = match data[start..].iter().position(|&b| b == b'\n') {
            Some(i) => start + i + 1,
            None => data.len(),
        };
        let mut content = &data[start..pos];
        content = content.strip_suffix(b"\n").unwrap_or(content);
        content = content.strip_suffix(b"\r").unwrap_or(content);
        Some(Line { start, content })
    })
}

/// `--boundary` or `--boundary--`, each optionally followed by linear whitespace.
fn delimiter_kind(line: &[u8], dash_boundary: &[u8]) -> Option<Delimiter> {
    let rest = line.strip_prefix(dash_boundary)?;
    let (kind, tail) = match rest.strip_prefix(b"--") {
        Some(tail) => (Delimiter::Close, tail),
        None => (Delimiter::Open, rest),
    };
    tail.iter()
        .all(|&b| b == b' ' || b == b'\t')
        .then_some(kind)
}

fn split(data: &[u8], boundary: &str) -> MultipartBody {
    let dash_boundary = format!("--{boundary}");
    let dash_boundary = dash_boundary.as_bytes();
    let mut lines = lines(data).peekable();
    let mut parts = Vec::new();

    let stopped = |parts, stop| MultipartBody {
        parts,
        stop: Some(stop),
    };

    // Preamble
    let mut opened = false;
    for line in lines.by_ref() {
        match delimiter_kind(line.content, dash_boundary) {
            Some(Delimiter::Open) => {
                opened = true;
                break;
            }
            Some(Delimiter::Close) => return MultipartBody { parts, stop: None },
            None => {}
        }
    }
    if !opened {
        return stopped(parts, WalkStop::NoDelimiter);
    }

    loop {
        // Header block, up to the first empty line
        let header_start = lines.peek().map_or(data.len(), |l| l.start);
        let mut header_end = None;
        for line in lines.by_ref() {
            if line.content.is_empty() {
                header_end = Some(line.start);
                break;
            }
            if delimiter_kind(line.content, dash_boundary).is_some() {
                break;
            }
        }
        let Some(header_end) = header_end else {
            return stopped(parts, WalkStop::UnterminatedHeaders);
        };

        // Body, up to the next delimiter line
        let body_start = lines.peek().map_or(data.len(), |l| l.start);
        let mut terminator = None;
        for line in lines.by_ref() {
            if let Some(kind) = delimiter_kind(line.content, dash_boundary) {
                terminator = Some((line.start, kind));
                break;
            }
        }
        let Some((delimiter_start, kind)) = terminator else {
            return stopped(parts, WalkStop::Truncated);
        };

        // The line break before a delimiter belongs to the delimiter
        let mut body_end = delimiter_start;
        if body_end > body_start && data[body_end - 1] == b'\n' {
            body_end -= 1;
            if body_end > body_start && data[body_end - 1] == b'\r' {
                body_end -= 1;
            }
        }

        let header = parse_header_block(&data[header_start..header_end]);
        let content_type = parse_content_type(header.get("content-type").unwrap_or(""));
        parts.push(BodyPart {
            header,
            content_type,
            body: data[body_start..body_end].to_vec(),
        });

        if kind == Delimiter::Close {
            return MultipartBody { parts, stop: None };
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use super::*;

    fn body_texts(walked: MultipartBody) -> Vec<String> {
        walked.parts.into_iter().map(BodyPart::into_text).collect()
    }

    #[test]
    fn test_two_parts_crlf() {
        let raw = "preamble\r\n--XYZ\r\nContent-Type: text/html\r\n\r\n<p>hi</p>\r\n\
                   --XYZ\r\nContent-Type: text/plain\r\n\r\nhello\r\n--XYZ--\r\nepilogue\r\n";
        let walked = walk(Cursor::new(raw), "XYZ");
        assert!(walked.is_complete());
        assert_eq!(walked.parts.len(), 2);
        assert!(walked.parts[0].content_type().is("text/html"));
        assert!(walked.parts[1].content_type().is("text/plain"));
        assert_eq!(body_texts(walked), ["<p>hi</p>", "hello"]);
    }

    #[test]
    fn test_lf_only_and_multiline_body() {
        let raw = "--b\nContent-Type: text/plain\n\nline one\n\nline three\n--b--\n";
        let walked = walk(Cursor::new(raw), "b");
        assert!(walked.is_complete());
        assert_eq!(body_texts(walked), ["line one\n\nline three"]);
    }

    #[test]
    fn test_part_without_headers() {
        let raw = "--b\r\n\r\nbare\r\n--b--";
        let walked = walk(Cursor::new(raw), "b");
        assert_eq!(walked.parts.len(), 1);
        assert!(walked.parts[0].header().is_empty());
        assert_eq!(walked.parts[0].content_type().media_type, "");
    }

    #[test]
    fn test_empty_part_body() {
        let raw = "--b\r\nContent-Type: text/plain\r\n\r\n--b--\r\n";
        let walked = walk(Cursor::new(raw), "b");
        assert_eq!(body_texts(walked), [""]);
    }

    #[test]
    fn test_boundary_prefix_is_body_content() {
        let raw = "--b\r\nContent-Type: text/plain\r\n\r\n--bogus line\r\n--b --\r\n--b--\r\n";
        let walked = walk(Cursor::new(raw), "b");
        assert!(walked.is_complete());
        assert_eq!(walked.parts.len(), 1);
        assert_eq!(body_texts(walked), ["--bogus line\r\n--b --"]);
    }

    #[test]
    fn test_delimiter_with_trailing_whitespace() {
        let raw = "--b  \r\nContent-Type: text/plain\r\n\r\nx\r\n--b--\t\r\n";
        let walked = walk(Cursor::new(raw), "b");
        assert!(walked.is_complete());
        assert_eq!(body_texts(walked), ["x"]);
    }

    #[test]
    fn test_folded_part_header() {
        let raw: &[u8] =
            b"--b\r\nContent-Type: text/plain;\r\n charset=\"euc-kr\"\r\n\r\n\xC7\xD1\r\n--b--";
        let walked = walk(Cursor::new(raw), "b");
        assert_eq!(walked.parts[0].content_type().charset(), Some("euc-kr"));
        assert_eq!(body_texts(walked), ["한"]);
    }

    #[test]
    fn test_nested_multipart_not_split() {
        let raw = "--outer\r\nContent-Type: multipart/alternative; boundary=inner\r\n\r\n\
                   --inner\r\nContent-Type: text/plain\r\n\r\nnested\r\n--inner--\r\n\
                   --outer--\r\n";
        let walked = walk(Cursor::new(raw), "outer");
        assert_eq!(walked.parts.len(), 1);
        let part = walked.parts.into_iter().next().unwrap();
        assert!(part.content_type().is_multipart());
        assert_eq!(part.content_type().boundary(), Some("inner"));
        let body = String::from_utf8(part.into_body()).unwrap();
        assert!(body.contains("--inner--"));
    }

    #[test]
    fn test_missing_boundary() {
        let walked = walk(Cursor::new("--x\r\n\r\nbody\r\n--x--"), "");
        assert!(walked.parts.is_empty());
        assert_eq!(walked.stop, Some(WalkStop::MissingBoundary));
    }

    #[test]
    fn test_no_delimiter() {
        let walked = walk(Cursor::new("just text\r\n"), "b");
        assert!(walked.parts.is_empty());
        assert_eq!(walked.stop, Some(WalkStop::NoDelimiter));
    }

    #[test]
    fn test_truncated_stream_keeps_completed_parts() {
        let raw = "--b\r\nContent-Type: text/html\r\n\r\n<b>a</b>\r\n\
                   --b\r\nContent-Type: text/plain\r\n\r\ncut off here";
        let walked = walk(Cursor::new(raw), "b");
        assert_eq!(walked.stop, Some(WalkStop::Truncated));
        assert_eq!(walked.parts.len(), 1);
        assert!(walked.parts[0].content_type().is("text/html"));
    }

    #[test]
    fn test_unterminated_headers() {
        let raw = "--b\r\nContent-Type: text/plain\r\n\r\nok\r\n--b\r\nContent-Type: text/plain";
        let walked = walk(Cursor::new(raw), "b");
        assert_eq!(walked.stop, Some(WalkStop::UnterminatedHeaders));
        assert_eq!(walked.parts.len(), 1);
    }

    #[test]
    fn test_end_of_stream_after_open_delimiter() {
        let raw = "--b\r\nContent-Type: text/plain\r\n\r\nok\r\n--b\r\n";
        let walked = walk(Cursor::new(raw), "b");
        assert_eq!(walked.stop, Some(WalkStop::UnterminatedHeaders));
        assert_eq!(body_texts(walked), ["ok"]);
    }

    /// Yields its data, then fails.
    struct FailingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            Ok(n)
        }
    }

    #[test]
    fn test_read_failure_keeps_parts_before_it() {
        let raw = b"--b\r\nContent-Type: text/plain\r\n\r\nfirst\r\n--b\r\nContent-Type: text/html\r\n\r\n<i>par".to_vec();
        let walked = walk(FailingReader { data: Cursor::new(raw) }, "b");
        assert!(matches!(walked.stop, Some(WalkStop::Read(_))));
        assert_eq!(body_texts(walked), ["first"]);
    }

    #[test]
    fn test_read_failure_after_close_is_ignored() {
        let raw = b"--b\r\nContent-Type: text/plain\r\n\r\nfirst\r\n--b--\r\n".to_vec();
        let walked = walk(FailingReader { data: Cursor::new(raw) }, "b");
        assert!(walked.is_complete());
    }
}
