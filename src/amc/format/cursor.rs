//! Forward-only reader over a catalog's byte stream.
//!
//! The cursor knows the total stream length up front, so every read can be
//! checked against the bytes that remain before anything is consumed. There is
//! deliberately no seek: the AMC format is read in a single pass.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::Encoding;

use crate::amc::types::error::{AmcError, Result};
use crate::amc::types::models::Blob;
use crate::amc::utils;

const BUFFER_SIZE: usize = 64 * 1024;

/// Counters collected while reading.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CursorStats {
    pub bytes_read: u64,
    pub strings_read: u64,
    pub blobs_read: u64,
}

/// A forward-only cursor with explicit position tracking.
#[derive(Debug)]
pub struct ByteCursor<R> {
    inner: R,
    position: u64,
    len: u64,
    stats: CursorStats,
}

impl ByteCursor<BufReader<File>> {
    /// Opens a file for buffered sequential reading.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self::new(BufReader::with_capacity(BUFFER_SIZE, file), len))
    }
}

impl<'a> ByteCursor<&'a [u8]> {
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self::new(data, data.len() as u64)
    }
}

impl<R: BufRead> ByteCursor<R> {
    /// Wraps a reader whose total length is `len` bytes.
    pub fn new(inner: R, len: u64) -> Self {
        Self {
            inner,
            position: 0,
            len,
            stats: CursorStats::default(),
        }
    }

    /// Current byte offset from the start of the stream.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total length of the stream.
    pub fn stream_len(&self) -> u64 {
        self.len
    }

    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.position)
    }

    pub fn at_end(&self) -> bool {
        self.remaining() == 0
    }

    pub fn stats(&self) -> CursorStats {
        self.stats
    }

    /// Reads exactly `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.ensure(n as u64)?;
        let offset = self.position;
        let mut buf = vec![0u8; n];
        self.inner
            .read_exact(&mut buf)
            .map_err(|e| eof_error(e, offset, n as u64))?;
        self.advance(n as u64);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let offset = self.position;
        let value = self.inner.read_u8().map_err(|e| eof_error(e, offset, 1))?;
        self.advance(1);
        Ok(value)
    }

    /// Reads a 32-bit little-endian signed integer.
    pub fn read_i32_le(&mut self) -> Result<i32> {
        self.ensure(4)?;
        let offset = self.position;
        let value = self
            .inner
            .read_i32::<LittleEndian>()
            .map_err(|e| eof_error(e, offset, 4))?;
        self.advance(4);
        Ok(value)
    }

    /// Reads a 32-bit length prefix and checks it against the remaining bytes.
    pub fn read_length_prefix(&mut self) -> Result<u64> {
        let offset = self.position;
        let length = self.read_i32_le()?;
        let remaining = self.remaining();
        if length < 0 || length as u64 > remaining {
            return Err(AmcError::InvalidLengthPrefix {
                offset,
                length: length.into(),
                remaining,
            });
        }
        Ok(length as u64)
    }

    /// Reads a length prefix followed by that many bytes.
    pub fn read_length_prefixed_blob(&mut self) -> Result<Blob> {
        let length = self.read_length_prefix()?;
        let data = self.read_bytes(length as usize)?;
        self.stats.blobs_read += 1;
        Blob::new(length, data)
    }

    /// Reads a length prefix followed by that many bytes of text.
    pub fn read_length_prefixed_text(&mut self, encoding: &'static Encoding) -> Result<String> {
        let length = self.read_length_prefix()?;
        let bytes = self.read_bytes(length as usize)?;
        self.stats.strings_read += 1;
        Ok(utils::decode_text(&bytes, encoding))
    }

    /// Reads bytes up to `delimiter`, consuming the delimiter but not returning it.
    pub fn read_delimited_bytes(&mut self, delimiter: u8) -> Result<Vec<u8>> {
        let offset = self.position;
        let limit = self.remaining();
        let mut buf = Vec::new();
        let n = (&mut self.inner).take(limit).read_until(delimiter, &mut buf)?;
        self.advance(n as u64);
        if buf.last() != Some(&delimiter) {
            return Err(AmcError::UnterminatedField { offset, delimiter });
        }
        buf.pop();
        Ok(buf)
    }

    /// Reads delimited text and decodes it.
    pub fn read_delimited_text(
        &mut self,
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> Result<String> {
        let bytes = self.read_delimited_bytes(delimiter)?;
        self.stats.strings_read += 1;
        Ok(utils::decode_text(&bytes, encoding))
    }

    /// Returns the next byte without consuming it.
    pub fn peek(&mut self) -> Result<Option<u8>> {
        if self.at_end() {
            return Ok(None);
        }
        let buf = self.inner.fill_buf()?;
        Ok(buf.first().copied())
    }

    fn ensure(&self, needed: u64) -> Result<()> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(AmcError::UnexpectedEndOfStream {
                offset: self.position,
                needed,
                remaining,
            });
        }
        Ok(())
    }

    fn advance(&mut self, n: u64) {
        self.position += n;
        self.stats.bytes_read += n;
    }
}

/// The file turned out shorter than its reported length.
fn eof_error(e: io::Error, offset: u64, needed: u64) -> AmcError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        AmcError::UnexpectedEndOfStream {
            offset,
            needed,
            remaining: 0,
        }
    } else {
        AmcError::Io(e)
    }
}
