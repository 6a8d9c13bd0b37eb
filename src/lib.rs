//! # amc-reader
//!
//! A reader for Ant Movie Catalog (`.amc`) files, format versions 3.x and 4.x.
//! Records are decoded lazily in a single forward pass; embedded images can be
//! extracted to a directory and the catalog can be exported to SQLite.
pub mod amc;
pub mod export;
pub mod run;

// Re-export the main types for convenience
pub use amc::{
    format::cursor::{ByteCursor, CursorStats},
    format::layout::RecordLayout,
    iter::Records,
    reader::{decode_slice, CatalogDecoder, DecodeOptions, TruncationPolicy},
    types::error::{AmcError, Result},
    types::models::{
        Blob, CatalogHeader, CatalogProperties, CustomFieldDef, DecodedCatalog, DecoderState,
        FieldValue, Fields, MovieRecord, TruncationInfo,
    },
};
pub use export::{
    database::{BlobStorage, DatabaseExporter, ExportOptions, ExportReport},
    images::{image_file_name, ImageExtractor, ImageReport},
};
pub use run::{run, RunOptions, RunReport, RunSummary};
