//! Common types and utilities for the cdsc schema compiler.
//!
//! This crate provides foundational types used across all cdsc crates:
//! - Source locations (`Location`) as carried by `$location` annotations
//! - Document paths (`DocumentPath`, `PathStep`) locating nodes in a schema document
//! - Centralized limits and thresholds

// Source positions of schema-document nodes
pub mod location;
pub use location::Location;

// Document paths - the property/index sequence leading to a node
pub mod path;
pub use path::{DocumentPath, PathStep};

// Centralized limits and thresholds
pub mod limits;

#[cfg(test)]
#[path = "tests/path_tests.rs"]
mod path_tests;
