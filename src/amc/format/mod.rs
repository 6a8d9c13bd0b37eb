//! File format parsing layer for AMC catalogs.
//!
//! This module sits between raw file I/O and the high-level
//! [`CatalogDecoder`](crate::amc::reader::CatalogDecoder).
//!
//! # Module Organization
//!
//! - [`cursor`]: Forward-only byte cursor with bounds checking
//! - [`field`]: Decodes one field according to its layout entry
//! - [`layout`]: The AMC field tables and per-catalog record layouts
//! - [`header`]: Parses the signature, owner properties and custom field definitions
//! - [`record`]: Assembles movie records
//!
//! # Architecture
//!
//! ```text
//! File Structure:
//! ┌──────────────────────┐
//! │  Signature (65 B)    │ ← header::assemble_header()
//! │  Owner properties    │
//! │  Custom fields (4.x) │
//! ├──────────────────────┤
//! │  Movie record #0     │ ← record::assemble_record()
//! │  Movie record #1     │
//! │  ...                 │
//! └──────────────────────┘
//! ```

pub mod cursor;
pub mod field;
pub mod header;
pub mod layout;
pub mod record;
