//! Name-resolution engine over compiled schema documents.
//!
//! Answers "what does this reference point to, and what can be referenced
//! from here?" for references anywhere in a [`SchemaDocument`]:
//! - [`cache`]: Node Cache, the per-session side table of derived facts
//! - [`topology`]: Query Topology Builder (query numbers, aliases, mixins,
//!   column/element links)
//! - `origin`: effective types, origins and navigation environments
//! - `inspect`: the Reference Resolver (`inspect_ref`, `artifact_ref`)
//! - `locations`: the Semantic-Location Mapper (`msg_locations`)
//! - [`session`]: the [`Resolver`] tying them together
//!
//! [`SchemaDocument`]: cdsc_model::SchemaDocument

pub mod cache;
pub use cache::{CacheStats, NodeCache, TypeState};

pub mod context;
pub use context::{DynamicSource, LexicalScopes, RefContext, Semantics};

pub mod error;
pub use error::{ModelError, ModelErrorKind, ResolveError, Result};

pub mod inspect;
pub use inspect::{ArtifactRef, Link, Resolution, Scope, ScopeEnv};

mod locations;
mod origin;
mod snapshot;

pub mod refs;
pub use refs::collect_ref_paths;

pub mod session;
pub use session::{Resolver, ResolverOptions};

pub mod topology;
pub use topology::{AliasBinding, QueryScope, Topology};

mod walker;

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod cache_tests;

#[cfg(test)]
#[path = "tests/context_tests.rs"]
mod context_tests;

#[cfg(test)]
#[path = "tests/topology_tests.rs"]
mod topology_tests;

#[cfg(test)]
#[path = "tests/walker_tests.rs"]
mod walker_tests;

#[cfg(test)]
#[path = "tests/origin_tests.rs"]
mod origin_tests;

#[cfg(test)]
#[path = "tests/inspect_tests.rs"]
mod inspect_tests;

#[cfg(test)]
#[path = "tests/locations_tests.rs"]
mod locations_tests;
