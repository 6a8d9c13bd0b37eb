//! Decoding of single fields according to their [`FieldSpec`].

use std::io::BufRead;

use log::trace;

use crate::amc::format::cursor::ByteCursor;
use crate::amc::types::error::{AmcError, Result};
use crate::amc::types::layout::*;
use crate::amc::types::models::{FieldValue, Fields};

/// Upper bound for group counts.
///
/// Larger counts are treated as a corrupt prefix rather than allocated.
pub const MAX_GROUP_ENTRIES: i32 = 1000;

/// Smallest encoding of one counted item: an empty length-prefixed text.
const MIN_ITEM_LEN: u64 = 4;

/// Decodes one field.
///
/// Presence is resolved first, from the format version or from the field's
/// optionality marker. An absent field returns `Ok(None)` without any
/// kind-specific read.
pub fn decode_field<R: BufRead>(
    cursor: &mut ByteCursor<R>,
    spec: &FieldSpec,
    ctx: &DecodeContext,
) -> Result<Option<FieldValue>> {
    let present = match spec.presence.for_version(ctx.version) {
        Some(present) => present,
        None => read_marker(cursor, spec, ctx)?,
    };
    if !present {
        trace!("    {} absent", spec.name);
        return Ok(None);
    }

    let offset = cursor.position();
    let value = decode_value(cursor, spec, ctx)?;
    trace!("    {} (pos {}): {}", spec.name, offset, value);
    Ok(Some(value))
}

/// Decodes `specs` in order, appending present fields to `out`.
///
/// On error `out` keeps everything decoded before the failing field.
pub fn decode_fields<R: BufRead>(
    cursor: &mut ByteCursor<R>,
    specs: &[FieldSpec],
    ctx: &DecodeContext,
    out: &mut Fields,
) -> Result<()> {
    for spec in specs {
        if let Some(value) = decode_field(cursor, spec, ctx)? {
            out.push(spec.name.clone(), value);
        }
    }
    Ok(())
}

fn read_marker<R: BufRead>(
    cursor: &mut ByteCursor<R>,
    spec: &FieldSpec,
    ctx: &DecodeContext,
) -> Result<bool> {
    let offset = cursor.position();
    let marker = cursor.read_u8()?;
    if marker == ctx.markers.absent {
        Ok(false)
    } else if marker == ctx.markers.present {
        Ok(true)
    } else {
        Err(AmcError::InvalidFormat(format!(
            "Unknown optionality marker {:#04x} for field '{}' at offset {}",
            marker, spec.name, offset
        )))
    }
}

fn decode_value<R: BufRead>(
    cursor: &mut ByteCursor<R>,
    spec: &FieldSpec,
    ctx: &DecodeContext,
) -> Result<FieldValue> {
    match spec.kind {
        FieldKind::Text(strategy) => read_text(cursor, strategy, ctx).map(FieldValue::Text),
        FieldKind::Integer(strategy) => {
            read_integer(cursor, strategy, &spec.name).map(FieldValue::Integer)
        }
        FieldKind::Boolean(strategy) => {
            read_boolean(cursor, strategy, &spec.name).map(FieldValue::Boolean)
        }
        FieldKind::Blob(_) => cursor.read_length_prefixed_blob().map(FieldValue::Blob),
        FieldKind::TextList(strategy) => {
            read_text_list(cursor, strategy, ctx).map(FieldValue::TextList)
        }
        FieldKind::Group(fields) => read_group(cursor, fields, ctx).map(FieldValue::Group),
    }
}

fn read_text<R: BufRead>(
    cursor: &mut ByteCursor<R>,
    strategy: TextStrategy,
    ctx: &DecodeContext,
) -> Result<String> {
    match strategy {
        TextStrategy::LengthPrefixed => cursor.read_length_prefixed_text(ctx.encoding),
        TextStrategy::Delimited(delimiter) => cursor.read_delimited_text(delimiter, ctx.encoding),
    }
}

fn read_integer<R: BufRead>(
    cursor: &mut ByteCursor<R>,
    strategy: NumberStrategy,
    name: &str,
) -> Result<i64> {
    match strategy {
        NumberStrategy::I32Le => Ok(cursor.read_i32_le()?.into()),
        NumberStrategy::U8 => Ok(cursor.read_u8()?.into()),
        NumberStrategy::Delimited(delimiter) => {
            let offset = cursor.position();
            let bytes = cursor.read_delimited_bytes(delimiter)?;
            let content = String::from_utf8_lossy(&bytes);
            content
                .trim()
                .parse::<i64>()
                .map_err(|_| malformed(name, offset, content.into_owned()))
        }
    }
}

fn read_boolean<R: BufRead>(
    cursor: &mut ByteCursor<R>,
    strategy: NumberStrategy,
    name: &str,
) -> Result<bool> {
    match strategy {
        NumberStrategy::I32Le => Ok(cursor.read_i32_le()? != 0),
        NumberStrategy::U8 => Ok(cursor.read_u8()? != 0),
        NumberStrategy::Delimited(delimiter) => {
            let offset = cursor.position();
            let bytes = cursor.read_delimited_bytes(delimiter)?;
            let content = String::from_utf8_lossy(&bytes);
            match content.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                _ => Err(malformed(name, offset, content.into_owned())),
            }
        }
    }
}

fn read_text_list<R: BufRead>(
    cursor: &mut ByteCursor<R>,
    strategy: ListStrategy,
    ctx: &DecodeContext,
) -> Result<Vec<String>> {
    match strategy {
        ListStrategy::CountPrefixed(item) => {
            let count = read_item_count(cursor)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_text(cursor, item, ctx)?);
            }
            Ok(items)
        }
        ListStrategy::Terminated { delimiter, end } => {
            let mut items = Vec::new();
            loop {
                match cursor.peek()? {
                    Some(byte) if byte == end => {
                        cursor.read_u8()?;
                        return Ok(items);
                    }
                    Some(_) => items.push(cursor.read_delimited_text(delimiter, ctx.encoding)?),
                    None => {
                        return Err(AmcError::UnterminatedField {
                            offset: cursor.position(),
                            delimiter: end,
                        })
                    }
                }
            }
        }
    }
}

fn read_group<R: BufRead>(
    cursor: &mut ByteCursor<R>,
    fields: &'static [FieldSpec],
    ctx: &DecodeContext,
) -> Result<Vec<Fields>> {
    let count = read_group_count(cursor)?;
    trace!("    reading {} group entries", count);
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let mut entry = Fields::new();
        decode_fields(cursor, fields, ctx, &mut entry)?;
        entries.push(entry);
    }
    Ok(entries)
}

fn read_group_count<R: BufRead>(cursor: &mut ByteCursor<R>) -> Result<usize> {
    let offset = cursor.position();
    let count = cursor.read_i32_le()?;
    if !(0..=MAX_GROUP_ENTRIES).contains(&count) {
        return Err(AmcError::InvalidLengthPrefix {
            offset,
            length: count.into(),
            remaining: cursor.remaining(),
        });
    }
    Ok(count as usize)
}

/// Reads the count of a list whose items are at least [`MIN_ITEM_LEN`] bytes.
///
/// Only negative counts are corrupt. A count the remaining bytes cannot hold
/// means the stream was cut short.
pub(crate) fn read_item_count<R: BufRead>(cursor: &mut ByteCursor<R>) -> Result<usize> {
    let offset = cursor.position();
    let count = cursor.read_i32_le()?;
    let remaining = cursor.remaining();
    if count < 0 || count as u64 > remaining {
        return Err(AmcError::InvalidLengthPrefix {
            offset,
            length: count.into(),
            remaining,
        });
    }
    let needed = count as u64 * MIN_ITEM_LEN;
    if needed > remaining {
        return Err(AmcError::UnexpectedEndOfStream {
            offset: cursor.position(),
            needed,
            remaining,
        });
    }
    Ok(count as usize)
}

fn malformed(name: &str, offset: u64, content: String) -> AmcError {
    AmcError::MalformedNumericField {
        field: name.to_string(),
        offset,
        content,
    }
}
