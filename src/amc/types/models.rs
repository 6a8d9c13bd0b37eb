//! Core data structures for decoded AMC catalogs.
//!
//! This module defines the values produced by the decoder:
//! - Catalog header and owner properties
//! - Typed field values and ordered field maps
//! - Movie records and the fully decoded catalog

use std::borrow::Cow;

use encoding_rs::Encoding;

use super::error::{AmcError, Result};

/// A length-prefixed binary payload, such as an embedded cover image.
///
/// The payload length always equals the length declared in the stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blob {
    declared_len: u64,
    data: Vec<u8>,
}

impl Blob {
    /// Wraps `data`, checking it against the declared length.
    pub fn new(declared_len: u64, data: Vec<u8>) -> Result<Self> {
        if data.len() as u64 != declared_len {
            return Err(AmcError::InvalidFormat(format!(
                "Blob length mismatch: declared {} bytes, got {}",
                declared_len,
                data.len()
            )));
        }
        Ok(Self { declared_len, data })
    }

    pub fn declared_len(&self) -> u64 {
        self.declared_len
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A single decoded field value.
///
/// The variant always matches the kind declared by the field's layout entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Blob(Blob),
    TextList(Vec<String>),
    /// Repeated sub-records, e.g. the extras attached to a movie.
    Group(Vec<Fields>),
}

impl FieldValue {
    /// Short name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Blob(_) => "blob",
            FieldValue::TextList(_) => "text list",
            FieldValue::Group(_) => "group",
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FieldValue::Text(s) if s.chars().count() > 50 => {
                let head: String = s.chars().take(50).collect();
                write!(f, "{:?}...", head)
            }
            FieldValue::Text(s) => write!(f, "{:?}", s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
            FieldValue::TextList(items) => write!(f, "{:?}", items),
            FieldValue::Group(entries) => write!(f, "<{} entries>", entries.len()),
        }
    }
}

/// An ordered mapping from field name to value, in stream order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(Cow<'static, str>, FieldValue)>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, name: Cow<'static, str>, value: FieldValue) {
        self.0.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.0.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(FieldValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(FieldValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn blob(&self, name: &str) -> Option<&Blob> {
        match self.get(name) {
            Some(FieldValue::Blob(b)) => Some(b),
            _ => None,
        }
    }

    pub fn text_list(&self, name: &str) -> Option<&[String]> {
        match self.get(name) {
            Some(FieldValue::TextList(items)) => Some(items),
            _ => None,
        }
    }

    pub fn group(&self, name: &str) -> Option<&[Fields]> {
        match self.get(name) {
            Some(FieldValue::Group(entries)) => Some(entries),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(n, v)| (n.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One cataloged movie.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecord {
    /// Zero-based ordinal of the record in the file. Used as the surrogate key.
    pub index: usize,
    /// Byte offset where the record starts.
    pub offset: u64,
    pub fields: Fields,
}

impl MovieRecord {
    /// The movie number assigned by the cataloging application (not guaranteed unique).
    pub fn number(&self) -> Option<i64> {
        self.fields.integer("number")
    }

    /// Original title, falling back to the translated title.
    pub fn title(&self) -> Option<&str> {
        self.fields
            .text("original_title")
            .filter(|t| !t.is_empty())
            .or_else(|| self.fields.text("translated_title").filter(|t| !t.is_empty()))
    }
}

/// Catalog owner information stored right after the signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogProperties {
    pub owner_name: String,
    pub owner_mail: String,
    pub owner_site: String,
    pub description: String,
}

/// Definition of a user-defined per-movie field (format 4.0+).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomFieldDef {
    pub tag: String,
    pub name: String,
    /// The application's type name, e.g. `ftString`, `ftInteger`, `ftList`.
    pub field_type: String,
    pub default_value: String,
    pub multi_values: bool,
    pub excluded_in_scripts: bool,
    /// Predefined values, only for `ftList` fields.
    pub list_values: Vec<String>,
}

/// Complete parsed header of an AMC file.
#[derive(Debug, Clone)]
pub struct CatalogHeader {
    /// The signature line, e.g. `AMC_4.2 Ant Movie Catalog 4.2.0.0`.
    pub signature: String,
    /// Format version as `major * 10 + minor` (`AMC_4.2` is 42).
    pub version: u32,
    /// Text encoding used for every string in the file.
    pub encoding: &'static Encoding,
    pub properties: CatalogProperties,
    pub column_settings: Option<String>,
    pub gui_properties: Option<String>,
    pub custom_fields: Vec<CustomFieldDef>,
}

impl CatalogHeader {
    /// Number of custom fields every record carries.
    pub fn field_count(&self) -> usize {
        self.custom_fields.len()
    }
}

/// Where a dropped partial record started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncationInfo {
    pub index: usize,
    pub offset: u64,
}

/// The header plus every record, in file order.
#[derive(Debug, Clone)]
pub struct DecodedCatalog {
    pub header: CatalogHeader,
    pub records: Vec<MovieRecord>,
    /// Set when a trailing partial record was dropped instead of reported.
    pub truncation: Option<TruncationInfo>,
}

/// Lifecycle of a [`CatalogDecoder`](crate::CatalogDecoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Start,
    HeaderRead,
    Reading,
    Done,
    Failed,
}
