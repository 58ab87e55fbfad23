//! Message entity: ordered header fields plus a single-read body stream.

use std::io::Read;

/// One header field as it appeared on the wire (unfolded, not decoded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    /// Field name as it appeared on the wire (e.g. `"Content-Type"`).
    pub name: String,
    /// Raw field value. RFC 2047 encoded-words are left untouched.
    pub value: String,
}

/// Ordered header fields with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: Vec<HeaderField>,
}

impl Header {
    /// Build a header from `(name, value)` pairs, keeping their order.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(name, value)| HeaderField {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }

    /// Append a field at the end.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(HeaderField {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Value of the first field named `name` (ASCII case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    /// All fields in wire order.
    pub fn fields(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A parsed message (or top-level MIME entity).
///
/// The body is an owned reader that can be consumed exactly once:
/// [`Entity::into_parts`] hands it out by value, and extraction takes the
/// whole entity, so a second read is impossible by construction.
#[derive(Debug)]
pub struct Entity<R> {
    header: Header,
    body: R,
}

impl<R: Read> Entity<R> {
    pub fn new(header: Header, body: R) -> Self {
        Self { header, body }
    }

    /// Header fields of this entity.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Split the entity into its header and its unread body stream.
    pub fn into_parts(self) -> (Header, R) {
        (self.header, self.body)
    }
}
