//! One decode pass feeding the optional consumers.
//!
//! Records are pulled from the decoder one at a time; each is handed to the
//! image extractor right away and buffered for the database until a batch is
//! full. A decode failure ends the pass but keeps whatever was already
//! extracted and exported.

use std::fmt;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::amc::format::cursor::CursorStats;
use crate::amc::reader::{CatalogDecoder, DecodeOptions};
use crate::amc::types::error::{AmcError, Result};
use crate::amc::types::models::{MovieRecord, TruncationInfo};
use crate::export::database::{DatabaseExporter, ExportOptions, ExportReport};
use crate::export::images::ImageExtractor;

/// What a run decodes and where the results go.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub decode: DecodeOptions,
    /// Directory for extracted images.
    pub images: Option<PathBuf>,
    /// SQLite database file.
    pub database: Option<PathBuf>,
    pub export: ExportOptions,
}

impl RunOptions {
    /// Neither images nor a database were requested.
    pub fn is_dry_run(&self) -> bool {
        self.images.is_none() && self.database.is_none()
    }
}

/// Counts gathered over one run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub signature: String,
    pub version: u32,
    pub custom_fields: usize,
    pub records: usize,
    pub images_written: usize,
    pub image_failures: usize,
    pub rows_exported: usize,
    pub custom_values_exported: usize,
    pub extras_exported: usize,
    pub export_failures: usize,
    pub truncation: Option<TruncationInfo>,
    pub stats: CursorStats,
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Catalog: {} (version {})", self.signature, self.version)?;
        writeln!(f, "  Records decoded: {}", self.records)?;
        writeln!(f, "  Custom fields: {}", self.custom_fields)?;
        writeln!(
            f,
            "  Images written: {} ({} failed)",
            self.images_written, self.image_failures
        )?;
        writeln!(
            f,
            "  Rows exported: {} ({} failed, {} custom field values, {} extras)",
            self.rows_exported,
            self.export_failures,
            self.custom_values_exported,
            self.extras_exported
        )?;
        if let Some(truncation) = self.truncation {
            writeln!(
                f,
                "  Dropped partial record #{} at offset {}",
                truncation.index, truncation.offset
            )?;
        }
        write!(f, "  Elapsed: {:.2}s", self.elapsed.as_secs_f64())
    }
}

/// Result of a run: the summary plus the error that stopped decoding, if any.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub failure: Option<AmcError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Decodes the file at `path` and feeds the configured consumers.
///
/// Errors opening the file or reading its header, or preparing an output,
/// are returned directly. Errors while reading records end up in
/// [`RunReport::failure`].
pub fn run(path: impl AsRef<Path>, options: &RunOptions) -> Result<RunReport> {
    let started = Instant::now();
    let decoder = CatalogDecoder::open(path, options.decode.clone())?;
    run_decoder(decoder, options, started)
}

/// Like [`run`], for a decoder that has already been constructed.
pub fn run_decoder<R: BufRead>(
    mut decoder: CatalogDecoder<R>,
    options: &RunOptions,
    started: Instant,
) -> Result<RunReport> {
    let header = decoder.header().clone();
    let mut summary = RunSummary {
        signature: header.signature.clone(),
        version: header.version,
        custom_fields: header.field_count(),
        ..RunSummary::default()
    };

    let extractor = match &options.images {
        Some(dir) => Some(ImageExtractor::new(dir, decoder.layout())?),
        None => None,
    };
    let exporter = match &options.database {
        Some(db) => {
            let exporter = DatabaseExporter::open(db, decoder.layout(), options.export.clone())?;
            exporter.prepare(&header)?;
            Some(exporter)
        }
        None => None,
    };
    if extractor.is_none() && exporter.is_none() {
        info!("No outputs requested, decoding only");
    }

    let batch_size = options.export.batch_size.max(1);
    let mut batch: Vec<MovieRecord> = Vec::new();

    let failure = loop {
        let record = match decoder.next_record() {
            Ok(Some(record)) => record,
            Ok(None) => break None,
            Err(e) => break Some(e),
        };

        if let Some(extractor) = &extractor {
            let report = extractor.extract(&record);
            summary.images_written += report.written.len();
            summary.image_failures += report.failures.len();
        }

        if let Some(exporter) = &exporter {
            batch.push(record);
            if batch.len() >= batch_size {
                add_export(&mut summary, exporter.export_batch(&batch)?);
                batch.clear();
            }
        }
    };

    if let Some(exporter) = &exporter {
        add_export(&mut summary, exporter.export_batch(&batch)?);
    }

    summary.records = decoder.records_read();
    summary.truncation = decoder.truncation();
    summary.stats = decoder.stats();
    summary.elapsed = started.elapsed();

    match &failure {
        Some(e) => warn!("Decoding stopped after {} records: {}", summary.records, e),
        None => info!(
            "Run complete: {} records in {:.2}s",
            summary.records,
            summary.elapsed.as_secs_f64()
        ),
    }

    Ok(RunReport { summary, failure })
}

fn add_export(summary: &mut RunSummary, report: ExportReport) {
    summary.rows_exported += report.rows;
    summary.custom_values_exported += report.custom_values;
    summary.extras_exported += report.extras;
    summary.export_failures += report.failures.len();
}
