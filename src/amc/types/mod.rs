//! Foundational data structures, error types, and layout descriptors.

pub mod error;
pub mod layout;
pub mod models;
