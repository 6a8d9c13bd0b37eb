use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use amc_reader::export::database::DEFAULT_BATCH_SIZE;
use amc_reader::{BlobStorage, DecodeOptions, ExportOptions, RunOptions, TruncationPolicy};
use clap::Parser;
use color_eyre::eyre::{self, eyre, WrapErr};
use env_logger::Env;
use log::LevelFilter;

/// How much the decoder reports while it works
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
enum DebugLevel {
    /// Errors only
    #[default]
    Silent,
    /// Milestones and progress
    Summary,
    /// Every record and field
    Trace,
}

#[derive(Debug)]
/// Failed to parse a debug level
struct DebugLevelError {}

impl fmt::Display for DebugLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Use one of `0`/`silent`, `1`/`summary` or `2`/`trace`")
    }
}

impl std::error::Error for DebugLevelError {}

impl FromStr for DebugLevel {
    type Err = DebugLevelError;
    fn from_str(val: &str) -> Result<Self, Self::Err> {
        match val {
            "0" | "silent" => Ok(Self::Silent),
            "1" | "summary" => Ok(Self::Summary),
            "2" | "trace" => Ok(Self::Trace),
            _ => Err(DebugLevelError {}),
        }
    }
}

impl DebugLevel {
    fn level_filter(self) -> LevelFilter {
        match self {
            Self::Silent => LevelFilter::Error,
            Self::Summary => LevelFilter::Info,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

/// Decode an Ant Movie Catalog file, extract its images and export it to SQLite
#[derive(Parser)]
#[clap(version)]
struct Options {
    /// Path to the AMC file
    file: PathBuf,

    #[clap(long)]
    /// Export to this SQLite database file
    sqlite_db: Option<PathBuf>,

    #[clap(long, value_name = "DIR")]
    /// Extract embedded images (movies and extras) to this directory
    extract_images: Option<PathBuf>,

    #[clap(short, long, default_value = "0")]
    /// Debug level: 0/silent, 1/summary, 2/trace
    debug: DebugLevel,

    #[clap(short, long)]
    /// Show read statistics
    stats: bool,

    #[clap(long)]
    /// Text encoding of the catalog (default: windows-1252)
    encoding: Option<String>,

    #[clap(long)]
    /// Drop a truncated trailing record instead of failing
    drop_partial: bool,

    #[clap(long, default_value_t = DEFAULT_BATCH_SIZE)]
    /// Records per database transaction
    batch_size: usize,

    #[clap(long, requires = "extract_images")]
    /// Store image file paths in the database instead of image bytes
    reference_images: bool,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opts = Options::parse();
    env_logger::Builder::new()
        .filter_level(opts.debug.level_filter())
        .format_timestamp(None)
        .parse_env(Env::default())
        .init();

    if !opts.file.exists() {
        return Err(eyre!("AMC file '{}' not found", opts.file.display()));
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            eprintln!("received Ctrl+C, stopping after the current record");
            cancel.store(true, Ordering::Relaxed);
        })
        .wrap_err("Error setting Ctrl-C handler")?;
    }

    let blob_storage = match (&opts.extract_images, opts.reference_images) {
        (Some(dir), true) => BlobStorage::Reference {
            image_dir: dir.clone(),
        },
        _ => BlobStorage::default(),
    };
    let options = RunOptions {
        decode: DecodeOptions {
            encoding: opts.encoding.clone(),
            truncation: if opts.drop_partial {
                TruncationPolicy::DropPartial
            } else {
                TruncationPolicy::Fatal
            },
            cancel: Some(cancel),
            ..DecodeOptions::default()
        },
        images: opts.extract_images.clone(),
        database: opts.sqlite_db.clone(),
        export: ExportOptions {
            batch_size: opts.batch_size,
            blob_storage,
        },
    };

    println!("Parsing AMC file: {}", opts.file.display());
    let report = amc_reader::run(&opts.file, &options)
        .wrap_err_with(|| format!("Failed to read {}", opts.file.display()))?;

    println!("{}", report.summary);
    if opts.stats {
        let stats = &report.summary.stats;
        println!("\nRead statistics:");
        println!("  Bytes read: {}", stats.bytes_read);
        println!("  Strings read: {}", stats.strings_read);
        println!("  Blobs read: {}", stats.blobs_read);
    }
    if options.is_dry_run() {
        println!("\nNo output specified. Use --sqlite-db or --extract-images");
    }

    match report.failure {
        Some(failure) => Err(eyre::Report::new(failure).wrap_err("Decoding did not complete")),
        None => Ok(()),
    }
}
