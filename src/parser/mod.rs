//! Message parsing: header blocks and encoded-words, Content-Type
//! resolution, charset decoding and multipart splitting.

pub mod charset;
pub mod content_type;
pub mod header;
pub mod multipart;
