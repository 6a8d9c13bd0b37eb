//! Core AMC decoding module

pub mod format;
pub mod iter;
pub mod reader;
pub mod types;
pub mod utils;
