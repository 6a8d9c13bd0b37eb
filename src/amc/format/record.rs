//! Assembly of movie records from the field layout.

use std::io::BufRead;

use log::debug;

use crate::amc::format::cursor::ByteCursor;
use crate::amc::format::field::decode_field;
use crate::amc::format::layout::{display_name, RecordLayout};
use crate::amc::types::error::{AmcError, Result};
use crate::amc::types::layout::DecodeContext;
use crate::amc::types::models::{FieldValue, Fields, MovieRecord};

/// Number of distinct color tags; stored values wrap around.
pub const COLOR_TAG_COUNT: i64 = 13;

/// Assembles the record starting at the cursor's position.
///
/// Returns `Ok(None)` when the stream is exhausted before the first field.
/// Running out of bytes later yields [`AmcError::TruncatedRecord`] carrying
/// the fields decoded so far; any other field error is returned unchanged.
pub fn assemble_record<R: BufRead>(
    cursor: &mut ByteCursor<R>,
    layout: &RecordLayout,
    ctx: &DecodeContext,
    index: usize,
) -> Result<Option<MovieRecord>> {
    if cursor.at_end() {
        return Ok(None);
    }

    let offset = cursor.position();
    let mut fields = Fields::new();
    for spec in layout.fields() {
        match decode_field(cursor, spec, ctx) {
            Ok(Some(value)) => fields.push(spec.name.clone(), value),
            Ok(None) => {}
            Err(e) if e.is_end_of_stream() => {
                debug!(
                    "Record #{} (pos {}) ends inside {}: {}",
                    index,
                    offset,
                    display_name(spec),
                    e
                );
                return Err(AmcError::TruncatedRecord {
                    index,
                    offset,
                    partial: Box::new(MovieRecord { index, offset, fields }),
                    source: Box::new(e),
                });
            }
            Err(e) => {
                debug!(
                    "Error reading {} of record #{} (pos {}): {}",
                    display_name(spec),
                    index,
                    offset,
                    e
                );
                return Err(e);
            }
        }
    }

    normalize(&mut fields, ctx.version);
    Ok(Some(MovieRecord { index, offset, fields }))
}

/// Brings values written by older releases onto the current scales.
///
/// Ratings before 3.5 were stored on a 0-10 scale; `-1` means unrated.
fn normalize(fields: &mut Fields, version: u32) {
    if version < 35 {
        if let Some(FieldValue::Integer(rating)) = fields.get_mut("rating") {
            if *rating != -1 {
                *rating *= 10;
            }
        }
    }
    if let Some(FieldValue::Integer(tag)) = fields.get_mut("color_tag") {
        *tag = tag.rem_euclid(COLOR_TAG_COUNT);
    }
}
