//! Resolver errors.
//!
//! Two kinds of failure leave the resolver:
//! - [`ModelError`]: the document is malformed or a reference cannot be
//!   resolved. Callers turn these into user-facing messages.
//! - [`ResolveError::Assertion`]: a resolver invariant was violated. These
//!   indicate a bug (here or upstream) and must not be downgraded.

use cdsc_common::Location;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolveError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelErrorKind {
    /// A name that should denote a top-level definition does not.
    UnknownDefinition,
    /// A path segment names no member of the environment it is looked up in.
    UnknownName,
    /// More than one table alias provides a member of this name.
    AmbiguousName,
    /// A node that must be navigated into has no elements or target.
    MissingEnvironment,
    /// A reference is not a string or a non-empty `ref` array.
    InvalidReference,
    /// A `type` / `$origin` chain revisits itself.
    CircularType,
    /// A query's shape is inconsistent (unknown `from`, unlinked columns, ...).
    MalformedQuery,
    /// The reference sits in a position with no resolution policy.
    UnsupportedContext,
    /// A document path does not lead to a node.
    InvalidPath,
}

impl ModelErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelErrorKind::UnknownDefinition => "unknown definition",
            ModelErrorKind::UnknownName => "unknown name",
            ModelErrorKind::AmbiguousName => "ambiguous name",
            ModelErrorKind::MissingEnvironment => "no navigation environment",
            ModelErrorKind::InvalidReference => "invalid reference",
            ModelErrorKind::CircularType => "circular type reference",
            ModelErrorKind::MalformedQuery => "malformed query",
            ModelErrorKind::UnsupportedContext => "unsupported reference context",
            ModelErrorKind::InvalidPath => "invalid document path",
        }
    }
}

impl fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recoverable resolution failure caused by the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelError {
    pub kind: ModelErrorKind,
    /// The offending name or path segment.
    pub name: Option<String>,
    /// Context tag of the reference being resolved.
    pub context: Option<&'static str>,
    pub location: Option<Location>,
    pub message: String,
}

impl ModelError {
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        ModelError {
            kind,
            name: None,
            context: None,
            location: None,
            message: message.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the context tag unless an inner resolution already did.
    pub fn with_context(mut self, context: &'static str) -> Self {
        if self.context.is_none() {
            self.context = Some(context);
        }
        self
    }

    pub fn with_location(mut self, location: Option<Location>) -> Self {
        if self.location.is_none() {
            self.location = location;
        }
        self
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(context) = self.context {
            write!(f, " (in `{context}`)")?;
        }
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ModelError {}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("internal assertion failed: {0}")]
    Assertion(String),
}

impl ResolveError {
    pub fn model(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        ResolveError::Model(ModelError::new(kind, message))
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        ResolveError::Assertion(message.into())
    }

    /// Internal assertions must propagate; only model errors may be reported
    /// and skipped.
    pub fn is_internal(&self) -> bool {
        matches!(self, ResolveError::Assertion(_))
    }

    pub fn as_model(&self) -> Option<&ModelError> {
        match self {
            ResolveError::Model(err) => Some(err),
            ResolveError::Assertion(_) => None,
        }
    }

    pub fn kind(&self) -> Option<ModelErrorKind> {
        self.as_model().map(|err| err.kind)
    }
}
