//! Field layout tables of the AMC format.
//!
//! These tables are the single source of truth for the byte order of records.
//! They were reverse-engineered from catalogs written by Ant Movie Catalog
//! 3.x and 4.x; every version gate below corresponds to a field that was added
//! or removed in that release.

use std::borrow::Cow;

use crate::amc::types::layout::*;
use crate::amc::types::models::CatalogHeader;

const TEXT: FieldKind = FieldKind::Text(TextStrategy::LengthPrefixed);
const INT: FieldKind = FieldKind::Integer(NumberStrategy::I32Le);
const BOOL: FieldKind = FieldKind::Boolean(NumberStrategy::U8);
const PICTURE: FieldKind = FieldKind::Blob(BlobKind::Image {
    path_field: "picture_path",
});

/// Prefix of the field names holding custom field values.
pub const CUSTOM_FIELD_PREFIX: &str = "custom.";

/// Size of the signature block at the start of every file.
pub const SIGNATURE_LEN: usize = 65;

/// Owner properties right after the signature.
pub static PROPERTY_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("owner_name", TEXT, Presence::Always),
    FieldSpec::new("owner_mail", TEXT, Presence::Always),
    // ICQ number, dropped in 3.5.
    FieldSpec::new("owner_icq", TEXT, Presence::Before(35)),
    FieldSpec::new("owner_site", TEXT, Presence::Always),
    FieldSpec::new("description", TEXT, Presence::Always),
];

/// Catalog-level settings preceding the custom field definitions (4.0+).
pub static CUSTOM_SECTION_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("column_settings", TEXT, Presence::Always),
    FieldSpec::new("gui_properties", TEXT, Presence::Always),
];

/// One custom field definition.
pub static CUSTOM_FIELD_DEF_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("tag", TEXT, Presence::Always),
    FieldSpec::new("name", TEXT, Presence::Always),
    FieldSpec::new("ext", TEXT, Presence::Since(41)),
    FieldSpec::new("type", TEXT, Presence::Always),
    FieldSpec::new("default_value", TEXT, Presence::Always),
    FieldSpec::new("media_info", TEXT, Presence::Since(41)),
    FieldSpec::new("multi_values", BOOL, Presence::Always),
    FieldSpec::new("multi_values_sep", INT, Presence::Since(41)),
    FieldSpec::new("multi_values_rmp", BOOL, Presence::Since(41)),
    FieldSpec::new("multi_values_patch", BOOL, Presence::Since(41)),
    FieldSpec::new("excluded_in_scripts", BOOL, Presence::Always),
    FieldSpec::new("gui_properties", TEXT, Presence::Always),
];

/// Trailer of a custom field definition whose type is [`LIST_FIELD_TYPE`].
pub static CUSTOM_LIST_FIELDS: &[FieldSpec] = &[
    FieldSpec::new(
        "list_values",
        FieldKind::TextList(ListStrategy::CountPrefixed(TextStrategy::LengthPrefixed)),
        Presence::Always,
    ),
    FieldSpec::new("list_auto_add", BOOL, Presence::Since(41)),
    FieldSpec::new("list_sort", BOOL, Presence::Since(41)),
    FieldSpec::new("list_auto_complete", BOOL, Presence::Since(41)),
    FieldSpec::new("list_use_catalog_values", BOOL, Presence::Since(41)),
];

/// Custom field type carrying predefined list values.
pub const LIST_FIELD_TYPE: &str = "ftList";

/// Extras attached to a movie (4.2+).
pub const EXTRA_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("checked", BOOL, Presence::Always),
    FieldSpec::new("tag", TEXT, Presence::Always),
    FieldSpec::new("title", TEXT, Presence::Always),
    FieldSpec::new("category", TEXT, Presence::Always),
    FieldSpec::new("url", TEXT, Presence::Always),
    FieldSpec::new("description", TEXT, Presence::Always),
    FieldSpec::new("comments", TEXT, Presence::Always),
    FieldSpec::new("created_by", TEXT, Presence::Always),
    FieldSpec::new("picture_path", TEXT, Presence::Always),
    FieldSpec::new("picture", PICTURE, Presence::Always),
];

/// Fields of a movie record up to and including its picture.
pub static MOVIE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("number", INT, Presence::Always),
    FieldSpec::new("date_added", INT, Presence::Always),
    FieldSpec::new("date_watched", INT, Presence::Since(42)),
    FieldSpec::new("user_rating", INT, Presence::Since(42)),
    FieldSpec::new("rating", INT, Presence::Always),
    FieldSpec::new("year", INT, Presence::Always),
    FieldSpec::new("length", INT, Presence::Always),
    FieldSpec::new("video_bitrate", INT, Presence::Always),
    FieldSpec::new("audio_bitrate", INT, Presence::Always),
    FieldSpec::new("disks", INT, Presence::Always),
    FieldSpec::new("color_tag", INT, Presence::Since(41)),
    FieldSpec::new("checked", BOOL, Presence::Always),
    FieldSpec::new("media", TEXT, Presence::Always),
    FieldSpec::new("media_type", TEXT, Presence::Since(33)),
    FieldSpec::new("source", TEXT, Presence::Since(33)),
    FieldSpec::new("borrower", TEXT, Presence::Always),
    FieldSpec::new("original_title", TEXT, Presence::Always),
    FieldSpec::new("translated_title", TEXT, Presence::Always),
    FieldSpec::new("director", TEXT, Presence::Always),
    FieldSpec::new("producer", TEXT, Presence::Always),
    FieldSpec::new("writer", TEXT, Presence::Since(42)),
    FieldSpec::new("composer", TEXT, Presence::Since(42)),
    FieldSpec::new("country", TEXT, Presence::Always),
    FieldSpec::new("category", TEXT, Presence::Always),
    FieldSpec::new("certification", TEXT, Presence::Since(42)),
    FieldSpec::new("actors", TEXT, Presence::Always),
    FieldSpec::new("url", TEXT, Presence::Always),
    FieldSpec::new("description", TEXT, Presence::Always),
    FieldSpec::new("comments", TEXT, Presence::Always),
    FieldSpec::new("file_path", TEXT, Presence::Since(42)),
    FieldSpec::new("video_format", TEXT, Presence::Always),
    FieldSpec::new("audio_format", TEXT, Presence::Always),
    FieldSpec::new("resolution", TEXT, Presence::Always),
    FieldSpec::new("framerate", TEXT, Presence::Always),
    FieldSpec::new("languages", TEXT, Presence::Always),
    FieldSpec::new("subtitles", TEXT, Presence::Always),
    FieldSpec::new("size", TEXT, Presence::Always),
    FieldSpec::new("picture_path", TEXT, Presence::Always),
    FieldSpec::new("picture", PICTURE, Presence::Always),
];

/// The group that closes every 4.2+ movie record.
pub const EXTRAS_FIELD: FieldSpec =
    FieldSpec::new("extras", FieldKind::Group(EXTRA_FIELDS), Presence::Since(42));

/// The complete per-record layout of one catalog.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    fields: Vec<FieldSpec>,
}

impl RecordLayout {
    /// Builds the movie layout for a catalog: fixed fields, one text field per
    /// custom field definition, then the extras.
    pub fn for_header(header: &CatalogHeader) -> Self {
        let mut fields = MOVIE_FIELDS.to_vec();
        if header.version >= 40 {
            fields.extend(header.custom_fields.iter().map(|def| {
                FieldSpec::owned(
                    format!("{}{}", CUSTOM_FIELD_PREFIX, def.tag),
                    TEXT,
                    Presence::Always,
                )
            }));
        }
        fields.push(EXTRAS_FIELD);
        Self { fields }
    }

    /// The movie layout of a catalog without custom fields.
    pub fn standard() -> Self {
        let mut fields = MOVIE_FIELDS.to_vec();
        fields.push(EXTRAS_FIELD);
        Self { fields }
    }

    /// Uses an arbitrary field list, e.g. for catalogs produced by other tools.
    ///
    /// Set it as [`DecodeOptions::layout`](crate::DecodeOptions::layout) to
    /// decode records with it.
    pub fn from_fields(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Number of fields present in a record of the given format version.
    pub fn present_count(&self, version: u32) -> usize {
        self.fields
            .iter()
            .filter(|spec| spec.presence.for_version(version).unwrap_or(true))
            .count()
    }
}

/// Returns the custom field tag if `name` is a custom field value.
pub fn custom_field_tag(name: &str) -> Option<&str> {
    name.strip_prefix(CUSTOM_FIELD_PREFIX)
}

/// Field name as it should be shown to people.
pub fn display_name(spec: &FieldSpec) -> Cow<'_, str> {
    match custom_field_tag(&spec.name) {
        Some(tag) => Cow::Owned(format!("custom field '{}'", tag)),
        None => Cow::Borrowed(spec.name.as_ref()),
    }
}
