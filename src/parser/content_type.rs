//! Content-Type resolution (RFC 2045 media types, RFC 2231 parameters).
//!
//! The media type is checked here; parameter values (quoting, RFC 2231
//! continuations and charsets) are decoded by `mail_parser`.

use std::collections::BTreeMap;

use mail_parser::{MessageParser, MimeHeaders};

/// A resolved `type/subtype` plus its parameters.
///
/// An empty `media_type` means the header was absent or unusable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentType {
    /// Lowercased media type, e.g. `"text/plain"`.
    pub media_type: String,
    /// Parameters keyed by lowercased name; values keep their case.
    pub params: BTreeMap<String, String>,
}

impl ContentType {
    /// Parameter value by (lowercase) name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn boundary(&self) -> Option<&str> {
        self.param("boundary")
    }

    pub fn charset(&self) -> Option<&str> {
        self.param("charset")
    }

    /// `true` for any `multipart/*` media type.
    pub fn is_multipart(&self) -> bool {
        self.media_type.starts_with("multipart/")
    }

    /// Exact media-type comparison (`media_type` is already lowercase).
    pub fn is(&self, media_type: &str) -> bool {
        self.media_type == media_type
    }
}

/// Why a Content-Type value could not be fully resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentTypeError {
    #[error("no Content-Type")]
    Missing,
    #[error("malformed media type '{0}'")]
    MalformedMediaType(String),
    #[error("duplicate parameter '{name}' for '{media_type}'")]
    DuplicateParameter { media_type: String, name: String },
    #[error("malformed parameter list for '{media_type}': {reason}")]
    MalformedParameters {
        media_type: String,
        reason: &'static str,
    },
}

impl ContentTypeError {
    /// The best-effort value to continue with: the media type survives a
    /// bad parameter list, nothing survives a bad media type or a
    /// repeated parameter name.
    pub fn fallback(&self) -> ContentType {
        match self {
            Self::MalformedParameters { media_type, .. } => ContentType {
                media_type: media_type.clone(),
                params: BTreeMap::new(),
            },
            _ => ContentType::default(),
        }
    }
}

/// Resolve a Content-Type value, falling back per [`ContentTypeError::fallback`].
pub fn parse_content_type(value: &str) -> ContentType {
    try_parse_content_type(value).unwrap_or_else(|e| e.fallback())
}

/// Resolve a Content-Type value, reporting what was malformed.
pub fn try_parse_content_type(value: &str) -> Result<ContentType, ContentTypeError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ContentTypeError::Missing);
    }

    let (media, rest) = match value.find(';') {
        Some(pos) => (&value[..pos], &value[pos + 1..]),
        None => (value, ""),
    };
    let media_type = media.trim().to_ascii_lowercase();

    let valid = media_type
        .split_once('/')
        .map(|(t, s)| is_token(t) && is_token(s))
        .unwrap_or(false);
    if !valid {
        return Err(ContentTypeError::MalformedMediaType(media.trim().to_string()));
    }

    let names = match param_names(rest) {
        Ok(names) => names,
        Err(ParamFault::Duplicate(name)) => {
            return Err(ContentTypeError::DuplicateParameter { media_type, name })
        }
        Err(ParamFault::Syntax(reason)) => {
            return Err(ContentTypeError::MalformedParameters { media_type, reason })
        }
    };
    if names.is_empty() {
        return Ok(ContentType {
            media_type,
            params: BTreeMap::new(),
        });
    }

    let raw = format!("Content-Type: {value}\r\n\r\n");
    let message = MessageParser::default().parse_headers(raw.as_bytes());
    let Some(parsed) = message.as_ref().and_then(|m| m.content_type()) else {
        return Err(ContentTypeError::MalformedParameters {
            media_type,
            reason: "unreadable parameter list",
        });
    };

    let mut params = BTreeMap::new();
    for name in names {
        // RFC 2231 sections (`title*0*`) come back joined under the base name
        let base = name.split('*').next().unwrap_or(name);
        let key = base.to_ascii_lowercase();
        if params.contains_key(&key) {
            continue;
        }
        let found = parsed.attribute(base).or_else(|| parsed.attribute(&key));
        if let Some(found) = found {
            params.insert(key, found.to_string());
        }
    }

    Ok(ContentType { media_type, params })
}

/// RFC 2045 token: non-empty, no spaces, controls or tspecials.
fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_byte)
}

fn is_token_byte(b: u8) -> bool {
    b > b' ' && b < 0x7f && !b"()<>@,;:\\\"/[]?=".contains(&b)
}

enum ParamFault {
    Duplicate(String),
    Syntax(&'static str),
}

/// Names of the `name=value` parameters in `rest`, in wire order.
///
/// Only the list's shape is checked: every entry needs a token name and a
/// non-empty value, quotes must close, and no name may repeat
/// (case-insensitively).
fn param_names(rest: &str) -> Result<Vec<&str>, ParamFault> {
    let mut names: Vec<&str> = Vec::new();
    for entry in split_params(rest).map_err(ParamFault::Syntax)? {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (name, value) = entry
            .split_once('=')
            .ok_or(ParamFault::Syntax("expected '=' after parameter name"))?;
        let name = name.trim();
        if !is_token(name) {
            return Err(ParamFault::Syntax("expected parameter name"));
        }
        let value = value.trim();
        if value.is_empty() {
            return Err(ParamFault::Syntax("missing parameter value"));
        }
        if value.starts_with('"') && (value.len() < 2 || !value.ends_with('"')) {
            return Err(ParamFault::Syntax("unexpected text after parameter value"));
        }
        if names.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
            return Err(ParamFault::Duplicate(name.to_ascii_lowercase()));
        }
        names.push(name);
    }
    Ok(names)
}

/// Split at `;` outside quoted strings.
fn split_params(rest: &str) -> Result<Vec<&str>, &'static str> {
    let mut entries = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, b) in rest.bytes().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if quoted => escaped = true,
            b'"' => quoted = !quoted,
            b';' if !quoted => {
                entries.push(&rest[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quoted {
        return Err("unterminated quoted string");
    }
    entries.push(&rest[start..]);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_media_type() {
        let ct = parse_content_type("text/plain");
        assert_eq!(ct.media_type, "text/plain");
        assert!(ct.params.is_empty());
    }

    #[test]
    fn test_media_type_lowercased_params_kept() {
        let ct = parse_content_type("Text/HTML; Charset=\"UTF-8\"");
        assert!(ct.is("text/html"));
        assert_eq!(ct.charset(), Some("UTF-8"));
    }

    #[test]
    fn test_multipart_boundary() {
        let ct = parse_content_type("multipart/mixed; boundary=XYZ");
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("XYZ"));
    }

    #[test]
    fn test_quoted_boundary_keeps_spaces_and_semicolons() {
        let ct = parse_content_type(r#"multipart/alternative; boundary="a b;c"; x=1"#);
        assert_eq!(ct.boundary(), Some("a b;c"));
        assert_eq!(ct.param("x"), Some("1"));
    }

    #[test]
    fn test_unquoted_boundary_with_equals() {
        let ct = parse_content_type("multipart/mixed; boundary=----=_Part_0_12.34");
        assert_eq!(ct.boundary(), Some("----=_Part_0_12.34"));
    }

    #[test]
    fn test_absent_is_empty() {
        assert_eq!(try_parse_content_type("  "), Err(ContentTypeError::Missing));
        assert_eq!(parse_content_type(""), ContentType::default());
    }

    #[test]
    fn test_malformed_media_type_is_empty() {
        for value in ["text", "/plain", "text/", "te xt/plain", "text/pl@in"] {
            let ct = parse_content_type(value);
            assert_eq!(ct.media_type, "", "value {value:?}");
            assert!(ct.params.is_empty());
        }
    }

    #[test]
    fn test_malformed_params_keep_media_type() {
        let err = try_parse_content_type("text/html; charset").unwrap_err();
        assert!(matches!(err, ContentTypeError::MalformedParameters { .. }));
        let ct = err.fallback();
        assert!(ct.is("text/html"));
        assert!(ct.params.is_empty());

        let ct = parse_content_type("multipart/mixed; boundary=\"unterminated");
        assert!(ct.is("multipart/mixed"));
        assert_eq!(ct.boundary(), None);
    }

    #[test]
    fn test_duplicate_param_empties_media_type() {
        let err = try_parse_content_type("text/plain; charset=a; CHARSET=b").unwrap_err();
        assert_eq!(
            err,
            ContentTypeError::DuplicateParameter {
                media_type: "text/plain".into(),
                name: "charset".into(),
            }
        );
        assert_eq!(err.fallback(), ContentType::default());
    }

    #[test]
    fn test_continuation_sections_are_not_duplicates() {
        let ct = parse_content_type("multipart/mixed; boundary*0=ab; boundary*1=cd");
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("abcd"));
    }

    #[test]
    fn test_trailing_semicolon_allowed() {
        let ct = parse_content_type("text/plain; charset=us-ascii;");
        assert_eq!(ct.charset(), Some("us-ascii"));
    }

    #[test]
    fn test_rfc2231_continuations() {
        let ct = parse_content_type("multipart/mixed; boundary*0=\"abc\"; boundary*1=def");
        assert_eq!(ct.boundary(), Some("abcdef"));
    }

    #[test]
    fn test_rfc2231_extended_value() {
        let ct = parse_content_type("application/x-stuff; title*=utf-8'en'%EC%95%88%EB%85%95");
        assert_eq!(ct.param("title"), Some("안녕"));
    }

    #[test]
    fn test_rfc2231_mixed_with_plain_params() {
        let ct = parse_content_type(
            "Multipart/Mixed; boundary*0=\"abc\"; boundary*1=def; title*=utf-8'en'%EC%95%88",
        );
        assert!(ct.is("multipart/mixed"));
        assert_eq!(ct.boundary(), Some("abcdef"));
        assert_eq!(ct.param("title"), Some("안"));
    }
}
