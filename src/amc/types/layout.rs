//! Declarative descriptors for the field layout of a catalog.
//!
//! The decoder never inspects bytes to guess what comes next: every record
//! follows an ordered list of [`FieldSpec`]s that states the kind of each
//! field, how its bytes are delimited, and when it is present at all.

use std::borrow::Cow;

use encoding_rs::Encoding;

/// How a text value is framed in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStrategy {
    /// 32-bit little-endian byte count followed by the bytes.
    LengthPrefixed,
    /// Bytes up to a terminating delimiter, which is consumed.
    Delimited(u8),
}

/// How an integer or boolean value is framed in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberStrategy {
    /// 32-bit little-endian signed integer.
    I32Le,
    /// A single byte.
    U8,
    /// Decimal text up to a terminating delimiter.
    Delimited(u8),
}

/// How a list of text values is framed in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStrategy {
    /// 32-bit little-endian item count, then that many text values.
    CountPrefixed(TextStrategy),
    /// Delimited items until the next byte equals `end`, which is consumed.
    Terminated { delimiter: u8, end: u8 },
}

/// What a binary payload contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    /// An image attachment. `path_field` names the sibling text field with the
    /// original file path, used to pick a file extension.
    Image { path_field: &'static str },
    Opaque,
}

/// The declared kind of a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text(TextStrategy),
    Integer(NumberStrategy),
    Boolean(NumberStrategy),
    Blob(BlobKind),
    TextList(ListStrategy),
    /// A 32-bit count followed by that many entries of the nested layout.
    Group(&'static [FieldSpec]),
}

/// When a field is present in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Always,
    /// Present from this format version on.
    Since(u32),
    /// Present only before this format version.
    Before(u32),
    /// Preceded by an optionality marker byte.
    Flagged,
}

impl Presence {
    /// Resolves presence from the format version alone.
    ///
    /// Returns `None` for [`Presence::Flagged`], whose presence is only known
    /// after reading the marker.
    pub fn for_version(&self, version: u32) -> Option<bool> {
        match *self {
            Presence::Always => Some(true),
            Presence::Since(v) => Some(version >= v),
            Presence::Before(v) => Some(version < v),
            Presence::Flagged => None,
        }
    }
}

/// One entry of a field layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: Cow<'static, str>,
    pub kind: FieldKind,
    pub presence: Presence,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind, presence: Presence) -> Self {
        Self {
            name: Cow::Borrowed(name),
            kind,
            presence,
        }
    }

    pub fn owned(name: String, kind: FieldKind, presence: Presence) -> Self {
        Self {
            name: Cow::Owned(name),
            kind,
            presence,
        }
    }
}

/// Marker byte values for [`Presence::Flagged`] fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerConvention {
    pub absent: u8,
    pub present: u8,
}

impl Default for MarkerConvention {
    fn default() -> Self {
        Self {
            absent: 0x00,
            present: 0x01,
        }
    }
}

/// Catalog-wide settings every field decode depends on.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext {
    pub version: u32,
    pub encoding: &'static Encoding,
    pub markers: MarkerConvention,
}
