//! Consumers of decoded records.
//!
//! - [`images`]: writes embedded images to a directory
//! - [`database`]: materializes records into SQLite

pub mod database;
pub mod images;
