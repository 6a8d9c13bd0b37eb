//! Custom error types for the amc-reader crate.

use std::path::PathBuf;
use thiserror::Error;

use super::models::MovieRecord;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum AmcError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the ` AMC_` signature.
    #[error("Not an AMC catalog: missing ' AMC_' signature")]
    InvalidSignature,

    /// Fewer bytes remain in the stream than a read requires.
    #[error("Unexpected end of stream at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEndOfStream {
        offset: u64,
        needed: u64,
        remaining: u64,
    },

    /// A length or count prefix is negative or larger than what the stream can hold.
    #[error("Invalid length prefix {length} at offset {offset} ({remaining} bytes remaining)")]
    InvalidLengthPrefix {
        offset: u64,
        length: i64,
        remaining: u64,
    },

    /// The stream ended before the delimiter of a delimited field was found.
    #[error("Unterminated field at offset {offset}: delimiter {delimiter:#04x} not found before end of stream")]
    UnterminatedField { offset: u64, delimiter: u8 },

    /// A textual numeric or boolean field did not parse.
    #[error("Malformed numeric field '{field}' at offset {offset}: {content:?}")]
    MalformedNumericField {
        field: String,
        offset: u64,
        content: String,
    },

    /// The stream ended in the middle of a record.
    ///
    /// Carries the fields decoded before the failure.
    #[error("Truncated record #{index} starting at offset {offset}: {source}")]
    TruncatedRecord {
        index: usize,
        offset: u64,
        partial: Box<MovieRecord>,
        #[source]
        source: Box<AmcError>,
    },

    /// The file is structurally invalid.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Writing an extracted image failed.
    #[error("Failed to write image {}: {source}", path.display())]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A database statement failed.
    #[error("Failed to export {what}: {source}")]
    ExportWrite {
        what: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Decoding was interrupted between two records.
    #[error("Decoding cancelled after {records} records")]
    Cancelled { records: usize },

    /// A mutex lock was poisoned, indicating a panic in another thread holding the lock.
    #[error("A mutex lock was poisoned, indicating a panic in another thread holding the lock.")]
    LockPoisoned,
}

impl AmcError {
    /// Whether this error means the stream ran out of bytes.
    ///
    /// A non-negative length prefix that overshoots the remaining bytes is a
    /// truncation, not a corrupt prefix.
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            AmcError::UnexpectedEndOfStream { .. } | AmcError::UnterminatedField { .. } => true,
            AmcError::InvalidLengthPrefix {
                length, remaining, ..
            } => *length >= 0 && (*length as u64) > *remaining,
            _ => false,
        }
    }

    /// Byte offset the error refers to, if it has one.
    pub fn offset(&self) -> Option<u64> {
        match self {
            AmcError::UnexpectedEndOfStream { offset, .. }
            | AmcError::InvalidLengthPrefix { offset, .. }
            | AmcError::UnterminatedField { offset, .. }
            | AmcError::MalformedNumericField { offset, .. } => Some(*offset),
            AmcError::TruncatedRecord { source, offset, .. } => source.offset().or(Some(*offset)),
            _ => None,
        }
    }

    pub(crate) fn export(what: impl Into<String>, source: rusqlite::Error) -> Self {
        AmcError::ExportWrite {
            what: what.into(),
            source,
        }
    }
}

/// A convenience `Result` type alias using the crate's `AmcError` type.
pub type Result<T> = std::result::Result<T, AmcError>;
