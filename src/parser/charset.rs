//! Body bytes to text.

use encoding_rs::{Encoding, WINDOWS_1252};

/// Turn body bytes into a `String`.
///
/// Valid UTF-8 is returned unchanged. Anything else is decoded with the
/// declared `charset`, or Windows-1252 when the charset is missing or
/// unknown (every byte maps to some character).
pub fn decode_text(bytes: Vec<u8>, charset: Option<&str>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            let bytes = e.into_bytes();
            let encoding = charset
                .and_then(|cs| Encoding::for_label(cs.trim().as_bytes()))
                .unwrap_or(WINDOWS_1252);
            let (decoded, _, _) = encoding.decode(&bytes);
            decoded.into_owned()
        }
    }
}
