use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use super::format::cursor::{ByteCursor, CursorStats};
use super::format::header::assemble_header;
use super::format::layout::RecordLayout;
use super::format::record::assemble_record;
use super::iter::Records;
use super::types::error::{AmcError, Result};
use super::types::layout::{DecodeContext, MarkerConvention};
use super::types::models::*;
use super::utils;

/// Records between two progress messages.
const PROGRESS_INTERVAL: usize = 500;

/// What to do when the stream ends in the middle of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TruncationPolicy {
    /// Report [`AmcError::TruncatedRecord`] and stop.
    #[default]
    Fatal,
    /// Drop the partial record, remember where it started and finish cleanly.
    DropPartial,
}

/// Settings for one decode pass.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Encoding label overriding the Windows-1252 default, e.g. `"utf-8"`.
    pub encoding: Option<String>,
    pub truncation: TruncationPolicy,
    /// Checked before every record; once set, decoding stops with
    /// [`AmcError::Cancelled`].
    pub cancel: Option<Arc<AtomicBool>>,
    pub markers: MarkerConvention,
    /// Record layout replacing the one derived from the header.
    pub layout: Option<RecordLayout>,
}

/// Sequential decoder for AMC catalog files.
///
/// The header is parsed on construction. Records are then read one at a
/// time, strictly in file order, so memory use stays bounded by the largest
/// single record. A decoder never moves backward; once it has failed it
/// yields nothing more.
#[derive(Debug)]
pub struct CatalogDecoder<R> {
    cursor: ByteCursor<R>,
    header: CatalogHeader,
    layout: RecordLayout,
    ctx: DecodeContext,
    truncation_policy: TruncationPolicy,
    cancel: Option<Arc<AtomicBool>>,
    state: DecoderState,
    next_index: usize,
    truncation: Option<TruncationInfo>,
}

impl CatalogDecoder<BufReader<File>> {
    /// Opens an AMC file and parses its header.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be opened
    /// - The file does not start with the ` AMC_` signature
    /// - The header is truncated or corrupt
    pub fn open(path: impl AsRef<Path>, options: DecodeOptions) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening AMC file: {}", path.display());
        let cursor = ByteCursor::from_file(path)?;
        info!("File size: {} bytes", cursor.stream_len());
        Self::new(cursor, options)
    }
}

impl<R: BufRead> CatalogDecoder<R> {
    /// Wraps a cursor positioned at the start of a catalog and parses the header.
    pub fn new(mut cursor: ByteCursor<R>, options: DecodeOptions) -> Result<Self> {
        let mut state = DecoderState::Start;
        debug!("Decoder state: {:?}", state);

        let encoding = match options.encoding.as_deref() {
            Some(label) => {
                let encoding = utils::parse_encoding(label);
                info!("Text encoding overridden: '{}'", encoding.name());
                encoding
            }
            None => utils::default_encoding(),
        };

        let header = assemble_header(&mut cursor, encoding)?;
        state = DecoderState::HeaderRead;

        let layout = match options.layout {
            Some(layout) => {
                info!("Using a custom record layout ({} fields)", layout.fields().len());
                layout
            }
            None => RecordLayout::for_header(&header),
        };
        debug!(
            "Record layout: {} fields ({} present in version {})",
            layout.fields().len(),
            layout.present_count(header.version),
            header.version
        );

        let ctx = DecodeContext {
            version: header.version,
            encoding: header.encoding,
            markers: options.markers,
        };

        Ok(Self {
            cursor,
            header,
            layout,
            ctx,
            truncation_policy: options.truncation,
            cancel: options.cancel,
            state,
            next_index: 0,
            truncation: None,
        })
    }

    pub fn header(&self) -> &CatalogHeader {
        &self.header
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Byte offset of the next record.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn stats(&self) -> CursorStats {
        self.cursor.stats()
    }

    /// Number of records returned so far.
    pub fn records_read(&self) -> usize {
        self.next_index
    }

    /// The partial record dropped under [`TruncationPolicy::DropPartial`], if any.
    pub fn truncation(&self) -> Option<TruncationInfo> {
        self.truncation
    }

    /// Reads the next record.
    ///
    /// Returns `Ok(None)` once the catalog is exhausted. After an error every
    /// further call fails as well.
    pub fn next_record(&mut self) -> Result<Option<MovieRecord>> {
        match self.state {
            DecoderState::Done => return Ok(None),
            DecoderState::Failed => {
                return Err(AmcError::InvalidFormat(format!(
                    "Decoding already stopped after {} records",
                    self.next_index
                )))
            }
            _ => {}
        }

        if self.is_cancelled() {
            warn!("Decoding cancelled after {} records", self.next_index);
            self.state = DecoderState::Failed;
            return Err(AmcError::Cancelled {
                records: self.next_index,
            });
        }

        self.state = DecoderState::Reading;
        match assemble_record(&mut self.cursor, &self.layout, &self.ctx, self.next_index) {
            Ok(Some(record)) => {
                debug!(
                    "Read record #{} (number {:?}): '{}'",
                    record.index,
                    record.number(),
                    record.title().unwrap_or_default()
                );
                self.next_index += 1;
                if self.next_index % PROGRESS_INTERVAL == 0 {
                    info!(
                        "Read {} records... ({:.1}%)",
                        self.next_index,
                        self.progress() * 100.0
                    );
                }
                Ok(Some(record))
            }
            Ok(None) => {
                self.finish();
                Ok(None)
            }
            Err(AmcError::TruncatedRecord {
                index,
                offset,
                source,
                ..
            }) if self.truncation_policy == TruncationPolicy::DropPartial => {
                warn!(
                    "Dropping truncated record #{} starting at offset {}: {}",
                    index, offset, source
                );
                self.truncation = Some(TruncationInfo { index, offset });
                self.finish();
                Ok(None)
            }
            Err(e) => {
                self.state = DecoderState::Failed;
                Err(e)
            }
        }
    }

    /// Lazy iterator over the remaining records.
    pub fn records(&mut self) -> Records<'_, R> {
        Records::new(self)
    }

    /// Reads every remaining record into memory.
    pub fn decode_all(mut self) -> Result<DecodedCatalog> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(DecodedCatalog {
            header: self.header,
            records,
            truncation: self.truncation,
        })
    }

    /// Fraction of the stream consumed so far.
    pub fn progress(&self) -> f64 {
        match self.cursor.stream_len() {
            0 => 1.0,
            len => self.cursor.position() as f64 / len as f64,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    fn finish(&mut self) {
        self.state = DecoderState::Done;
        let stats = self.cursor.stats();
        info!(
            "Successfully read {} records ({} strings, {} blobs, {} bytes)",
            self.next_index, stats.strings_read, stats.blobs_read, stats.bytes_read
        );
    }
}

/// Decodes a catalog held in memory.
pub fn decode_slice(data: &[u8], options: DecodeOptions) -> Result<DecodedCatalog> {
    CatalogDecoder::new(ByteCursor::from_slice(data), options)?.decode_all()
}
