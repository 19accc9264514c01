//! Source locations.
//!
//! Compiled schema documents keep the position of the originating source
//! construct in a `$location` property (`{ file, line, col }`). Locations are
//! optional everywhere: inferred and synthesized nodes usually carry none.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in a source file, 1-based line and column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
    #[serde(default, rename = "endLine", skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(default, rename = "endCol", skip_serializing_if = "Option::is_none")]
    pub end_col: Option<u32>,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Location {
            file: file.into(),
            line: Some(line),
            col: Some(col),
            end_line: None,
            end_col: None,
        }
    }

    /// A location that only names a file.
    pub fn file_only(file: impl Into<String>) -> Self {
        Location {
            file: file.into(),
            ..Location::default()
        }
    }

    /// Whether this location points into a file at a concrete line.
    pub fn has_position(&self) -> bool {
        self.line.is_some()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(col) = self.col {
                write!(f, ":{col}")?;
            }
        }
        Ok(())
    }
}
