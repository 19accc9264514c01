//! Document loading errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema document must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("schema document has no `definitions` object")]
    MissingDefinitions,
}
