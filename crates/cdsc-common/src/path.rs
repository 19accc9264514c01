//! Document paths.
//!
//! A document path is the sequence of property names and array indices that
//! leads from the document root to one node, e.g.
//! `definitions / V / query / SELECT / columns / 0`. Paths drive both
//! reference-context classification and diagnostics.

use serde::ser::{Serialize, SerializeSeq, Serializer};
use smallvec::SmallVec;
use std::fmt;

/// One step of a document path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// A property name of an object node.
    Key(String),
    /// A position in an array node.
    Index(usize),
}

impl PathStep {
    pub fn key(name: impl Into<String>) -> Self {
        PathStep::Key(name.into())
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathStep::Key(name) => Some(name),
            PathStep::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathStep::Index(idx) => Some(*idx),
            PathStep::Key(_) => None,
        }
    }

    /// Whether this step is the property `name`.
    pub fn is(&self, name: &str) -> bool {
        self.as_key() == Some(name)
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Key(name) => f.write_str(name),
            PathStep::Index(idx) => write!(f, "{idx}"),
        }
    }
}

impl From<&str> for PathStep {
    fn from(name: &str) -> Self {
        PathStep::Key(name.to_string())
    }
}

impl From<String> for PathStep {
    fn from(name: String) -> Self {
        PathStep::Key(name)
    }
}

impl From<usize> for PathStep {
    fn from(idx: usize) -> Self {
        PathStep::Index(idx)
    }
}

/// The property/index sequence locating a node in a schema document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    steps: SmallVec<[PathStep; 8]>,
}

impl DocumentPath {
    pub fn new() -> Self {
        DocumentPath::default()
    }

    /// Path to a top-level definition: `definitions / name`.
    pub fn definition(name: &str) -> Self {
        let mut path = DocumentPath::new();
        path.push("definitions");
        path.push(name);
        path
    }

    /// Parse a `/`-separated path. All-digit steps become array indices.
    ///
    /// Empty steps (leading, trailing or doubled separators) are ignored.
    pub fn parse(text: &str) -> Self {
        text.split('/')
            .filter(|step| !step.is_empty())
            .map(|step| match step.parse::<usize>() {
                Ok(idx) if step.bytes().all(|b| b.is_ascii_digit()) => PathStep::Index(idx),
                _ => PathStep::Key(step.to_string()),
            })
            .collect()
    }

    pub fn push(&mut self, step: impl Into<PathStep>) {
        self.steps.push(step.into());
    }

    /// A copy of this path extended by one step.
    pub fn child(&self, step: impl Into<PathStep>) -> Self {
        let mut path = self.clone();
        path.push(step);
        path
    }

    pub fn pop(&mut self) -> Option<PathStep> {
        self.steps.pop()
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&PathStep> {
        self.steps.last()
    }

    pub fn get(&self, idx: usize) -> Option<&PathStep> {
        self.steps.get(idx)
    }

    /// Name of the top-level definition this path points into, if any.
    pub fn definition_name(&self) -> Option<&str> {
        match self.steps.as_slice() {
            [first, PathStep::Key(name), ..] if first.is("definitions") => Some(name),
            _ => None,
        }
    }

    pub fn starts_with(&self, prefix: &DocumentPath) -> bool {
        self.steps.starts_with(&prefix.steps)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathStep> {
        self.steps.iter()
    }
}

impl FromIterator<PathStep> for DocumentPath {
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Self {
        DocumentPath {
            steps: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DocumentPath {
    type Item = &'a PathStep;
    type IntoIter = std::slice::Iter<'a, PathStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// Serialized as a JSON array of strings and numbers, the shape other
/// compiler tooling uses for paths.
impl Serialize for DocumentPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.steps.len()))?;
        for step in &self.steps {
            match step {
                PathStep::Key(name) => seq.serialize_element(name)?,
                PathStep::Index(idx) => seq.serialize_element(idx)?,
            }
        }
        seq.end()
    }
}
