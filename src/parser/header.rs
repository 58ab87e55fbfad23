//! RFC 5322 header blocks: reading, unfolding, encoded-words (RFC 2047)
//! and date normalization.

use std::io::BufRead;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::{DateTime, Utc};

use crate::error::{BackupError, Result};
use crate::model::entity::{Entity, Header};

/// B-encoding decoder that accepts encoded-words with or without padding.
const B_ENCODING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Read the header block of a raw message and return the entity whose body
/// is the rest of `reader`, still unread.
///
/// A leading MBOX `From ` separator line is skipped, so `.eml` files cut
/// from an MBOX archive parse the same way as messages fetched over POP3.
/// A message without a blank line is all header and an empty body.
pub fn read_entity<R: BufRead>(mut reader: R) -> Result<Entity<R>> {
    let mut block = Vec::new();
    let mut line = Vec::new();
    let mut first = true;

    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| BackupError::MalformedMessage(format!("header block unreadable: {e}")))?;
        if n == 0 {
            break;
        }
        if first {
            first = false;
            let unbommed = line.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(&line[..]);
            if unbommed.starts_with(b"From ") {
                continue;
            }
        }
        if line == b"\n" || line == b"\r\n" {
            break;
        }
        block.extend_from_slice(&line);
    }

    Ok(Entity::new(parse_header_block(&block), reader))
}

/// Parse a header block (everything before the blank line) into fields.
pub fn parse_header_block(raw: &[u8]) -> Header {
    let text = decode_header_bytes(raw);
    Header::from_pairs(unfold_headers(&text))
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Join continuation lines (starting with space or tab) onto the previous field.
///
/// Names keep their case; values are trimmed but not decoded.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                if !last.1.is_empty() {
                    last.1.push(' ');
                }
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim();
            if name.is_empty() {
                continue;
            }
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name.to_string(), value));
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    result
}

// ── Encoded-words ───────────────────────────────────────────────

/// Why an encoded-word could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WordDecodeError {
    #[error("unknown encoded-word encoding '{0}'")]
    UnknownEncoding(String),
    #[error("unknown charset '{0}'")]
    UnknownCharset(String),
    #[error("invalid base64 in encoded-word")]
    InvalidBase64,
    #[error("invalid Q-encoding escape")]
    InvalidQuoted,
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Text that does not look like an encoded-word is kept literally. An
/// encoded-word with a bad encoding, charset or payload is an error.
pub fn decode_header_value(input: &str) -> std::result::Result<String, WordDecodeError> {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two encoded-words is dropped (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        match decode_one_word(after_start)? {
            Some(decoded) => {
                result.push_str(&decoded.text);
                remaining = &after_start[decoded.consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    Ok(result)
}

/// Decode a header value for display, keeping the raw text on failure.
pub fn display_header_value(raw: &str) -> String {
    decode_header_value(raw).unwrap_or_else(|_| raw.to_string())
}

/// Render one field of a full header dump.
///
/// Values that fail to decode are shown raw behind a `[Decode Error]` marker.
pub fn dump_header_value(raw: &str) -> String {
    match decode_header_value(raw) {
        Ok(decoded) => decoded,
        Err(_) => format!("[Decode Error] {raw}"),
    }
}

struct DecodedWord {
    text: String,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

/// Decode one `charset?encoding?text?=` word.
///
/// `Ok(None)` means the text is not shaped like an encoded-word at all.
fn decode_one_word(s: &str) -> std::result::Result<Option<DecodedWord>, WordDecodeError> {
    let Some(first_q) = s.find('?') else {
        return Ok(None);
    };
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let Some(second_q) = rest.find('?') else {
        return Ok(None);
    };
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let Some(end) = rest2.find("?=") else {
        return Ok(None);
    };
    let encoded_text = &rest2[..end];

    if charset.is_empty() || charset.contains(char::is_whitespace) || encoding.len() != 1 {
        return Ok(None);
    }

    let bytes = match encoding {
        "B" | "b" => B_ENCODING
            .decode(encoded_text)
            .map_err(|_| WordDecodeError::InvalidBase64)?,
        "Q" | "q" => decode_q_encoding(encoded_text)?,
        other => return Err(WordDecodeError::UnknownEncoding(other.to_string())),
    };

    let text = decode_charset(charset, &bytes)?;

    Ok(Some(DecodedWord {
        text,
        consumed: first_q + 1 + second_q + 1 + end + 2,
    }))
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> std::result::Result<Vec<u8>, WordDecodeError> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or(WordDecodeError::InvalidQuoted)?;
                result.push(hex);
                i += 3;
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    Ok(result)
}

/// Decode bytes using a named charset (an RFC 2231 `*language` suffix is ignored).
fn decode_charset(charset: &str, bytes: &[u8]) -> std::result::Result<String, WordDecodeError> {
    let label = charset.split('*').next().unwrap_or(charset);
    if label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8") {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| WordDecodeError::UnknownCharset(charset.to_string()))?;
    let (decoded, _, _) = encoding.decode(bytes);
    Ok(decoded.into_owned())
}

// ── Dates ───────────────────────────────────────────────────────

/// Normalize an email `Date:` value to UTC.
///
/// Tries RFC 2822 and RFC 3339 first, then `mail-parser`'s lenient parser.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    mail_parser_date(trimmed)
}

/// Attempt to parse a date using `mail-parser`'s built-in parser.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    use mail_parser::MessageParser;

    // Wrap input in a minimal RFC 5322 message so mail-parser can parse it
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
