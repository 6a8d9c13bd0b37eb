//! Lazy iteration over the records of a catalog.
//!
//! # Example
//! ```no_run
//! # use amc_reader::{CatalogDecoder, DecodeOptions};
//! let mut decoder = CatalogDecoder::open("movies.amc", DecodeOptions::default()).unwrap();
//! for record in decoder.records() {
//!     let record = record.unwrap();
//!     println!("{:04}: {}", record.index, record.title().unwrap_or("?"));
//! }
//! ```

use std::io::BufRead;

use super::reader::CatalogDecoder;
use super::types::error::Result;
use super::types::models::{DecoderState, MovieRecord};

/// Iterator over the remaining records of a [`CatalogDecoder`].
///
/// Yields at most one error, after which it is exhausted.
///
/// Created by [`CatalogDecoder::records()`].
pub struct Records<'a, R> {
    decoder: &'a mut CatalogDecoder<R>,
}

impl<'a, R: BufRead> Records<'a, R> {
    pub(super) fn new(decoder: &'a mut CatalogDecoder<R>) -> Self {
        Self { decoder }
    }
}

impl<'a, R: BufRead> Iterator for Records<'a, R> {
    type Item = Result<MovieRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.decoder.state(), DecoderState::Done | DecoderState::Failed) {
            return None;
        }
        self.decoder.next_record().transpose()
    }
}
