//! Compiled schema document model.
//!
//! The document is loaded once from JSON and stored in an arena; every node
//! is addressed by a stable [`NodeId`]. The arena is immutable after loading:
//! tools that derive facts about nodes (parent links, resolved references,
//! query topology) keep them in side tables keyed by `NodeId`.
//!
//! - [`node`]: `NodeId`, `Node` and the JSON-shaped `Value`
//! - [`document`]: `SchemaDocument` (loading, navigation, paths, locations)
//! - [`artifact`]: typed views over definitions and members (`DefinitionKind`,
//!   `StructuralFacts`) and reference-shape helpers

pub mod node;
pub use node::{Node, NodeId, Value};

pub mod document;
pub use document::SchemaDocument;

pub mod artifact;
pub use artifact::{Artifact, DefinitionKind, StructuralFacts, is_builtin_type};

pub mod error;
pub use error::LoadError;

#[cfg(test)]
#[path = "tests/document_tests.rs"]
mod document_tests;

#[cfg(test)]
#[path = "tests/artifact_tests.rs"]
mod artifact_tests;
