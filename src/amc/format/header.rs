//! AMC catalog header parsing.
//!
//! This module handles:
//! - Validating the ` AMC_` signature block
//! - Deriving the numeric format version from the signature
//! - Reading the owner properties
//! - Reading the custom field definitions of 4.x catalogs

use std::io::BufRead;

use encoding_rs::Encoding;
use log::{debug, info, trace, warn};

use crate::amc::format::cursor::ByteCursor;
use crate::amc::format::field::{decode_fields, read_item_count};
use crate::amc::format::layout::{
    CUSTOM_FIELD_DEF_FIELDS, CUSTOM_LIST_FIELDS, CUSTOM_SECTION_FIELDS, LIST_FIELD_TYPE,
    PROPERTY_FIELDS, SIGNATURE_LEN,
};
use crate::amc::types::error::{AmcError, Result};
use crate::amc::types::layout::{DecodeContext, MarkerConvention};
use crate::amc::types::models::{CatalogHeader, CatalogProperties, CustomFieldDef, Fields};
use crate::amc::utils;

const SIGNATURE_PREFIX: &[u8] = b" AMC_";

/// Version assumed when the signature carries no readable version number.
pub const DEFAULT_VERSION: u32 = 10;

/// Parses the catalog header from the beginning of the stream.
///
/// # Header Structure
/// ```text
/// [65 bytes] Signature block, " AMC_<major>.<minor> ..." padded with NULs
/// [text]     owner_name, owner_mail, (icq, before 3.5), owner_site, description
/// 4.0+ only:
/// [text]     column_settings, gui_properties
/// [i32]      number of custom field definitions
/// [...]      the definitions
/// ```
///
/// All text is length-prefixed and decoded with `encoding`.
pub fn assemble_header<R: BufRead>(
    cursor: &mut ByteCursor<R>,
    encoding: &'static Encoding,
) -> Result<CatalogHeader> {
    info!("Parsing AMC header");

    let block = cursor.read_bytes(SIGNATURE_LEN).map_err(|e| {
        if e.is_end_of_stream() {
            AmcError::InvalidSignature
        } else {
            e
        }
    })?;
    if !block.starts_with(SIGNATURE_PREFIX) {
        return Err(AmcError::InvalidSignature);
    }

    let signature = signature_text(&block);
    let version = parse_version(&block).unwrap_or_else(|| {
        warn!(
            "Could not read a format version from signature '{}', assuming {}",
            signature, DEFAULT_VERSION
        );
        DEFAULT_VERSION
    });
    debug!("Detected AMC version {} from signature '{}'", version, signature);

    let ctx = DecodeContext {
        version,
        encoding,
        markers: MarkerConvention::default(),
    };

    let mut fields = Fields::new();
    decode_fields(cursor, PROPERTY_FIELDS, &ctx, &mut fields)?;
    let properties = CatalogProperties {
        owner_name: take_text(&fields, "owner_name"),
        owner_mail: take_text(&fields, "owner_mail"),
        owner_site: take_text(&fields, "owner_site"),
        description: take_text(&fields, "description"),
    };
    debug!("Owner: '{}'", properties.owner_name);

    let mut header = CatalogHeader {
        signature,
        version,
        encoding,
        properties,
        column_settings: None,
        gui_properties: None,
        custom_fields: Vec::new(),
    };

    if version >= 40 {
        read_custom_section(cursor, &ctx, &mut header)?;
    }

    info!(
        "Header parsed successfully: version={}, encoding={}, custom fields={}, records start at {}",
        header.version,
        header.encoding.name(),
        header.custom_fields.len(),
        cursor.position()
    );
    Ok(header)
}

fn read_custom_section<R: BufRead>(
    cursor: &mut ByteCursor<R>,
    ctx: &DecodeContext,
    header: &mut CatalogHeader,
) -> Result<()> {
    let mut section = Fields::new();
    decode_fields(cursor, CUSTOM_SECTION_FIELDS, ctx, &mut section)?;
    header.column_settings = Some(take_text(&section, "column_settings"));
    header.gui_properties = Some(take_text(&section, "gui_properties"));

    let count = read_item_count(cursor)?;
    debug!("Reading {} custom field definitions", count);

    for i in 0..count {
        trace!("  custom field {}/{} at pos {}", i + 1, count, cursor.position());
        let mut def = Fields::new();
        decode_fields(cursor, CUSTOM_FIELD_DEF_FIELDS, ctx, &mut def)?;
        if def.text("type") == Some(LIST_FIELD_TYPE) {
            decode_fields(cursor, CUSTOM_LIST_FIELDS, ctx, &mut def)?;
        }

        let definition = CustomFieldDef {
            tag: take_text(&def, "tag"),
            name: take_text(&def, "name"),
            field_type: take_text(&def, "type"),
            default_value: take_text(&def, "default_value"),
            multi_values: def.boolean("multi_values").unwrap_or(false),
            excluded_in_scripts: def.boolean("excluded_in_scripts").unwrap_or(false),
            list_values: def
                .text_list("list_values")
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
        };
        debug!(
            "Custom field '{}' ({}): '{}'",
            definition.tag, definition.field_type, definition.name
        );
        header.custom_fields.push(definition);
    }
    Ok(())
}

/// The signature block up to its first NUL, trimmed.
fn signature_text(block: &[u8]) -> String {
    let end = block.iter().position(|&b| b == 0).unwrap_or(block.len());
    utils::decode_text(&block[..end], encoding_rs::WINDOWS_1252)
        .trim()
        .to_string()
}

/// Reads `major * 10 + minor` from `" AMC_<major>.<minor>"`.
fn parse_version(block: &[u8]) -> Option<u32> {
    let rest = block.get(SIGNATURE_PREFIX.len()..)?;
    let window = &rest[..rest.len().min(5)];
    let window = std::str::from_utf8(window).ok()?;
    let (major, minor) = window.split_once('.')?;
    let major: u32 = major.trim().parse().ok()?;
    let minor = minor.chars().next().unwrap_or('0').to_digit(10)?;
    Some(major * 10 + minor)
}

fn take_text(fields: &Fields, name: &str) -> String {
    fields.text(name).unwrap_or_default().to_string()
}
