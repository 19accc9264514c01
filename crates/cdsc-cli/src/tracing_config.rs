//! Tracing configuration for debugging resolution runs.
//!
//! Output format is selected by `CDSC_LOG_FORMAT`:
//!
//! - `text` (default): flat `tracing-subscriber` lines
//! - `tree`: indented span hierarchy via `tracing-tree`
//! - `json`: one JSON object per span/event
//!
//! ```bash
//! CDSC_LOG=debug CDSC_LOG_FORMAT=tree cdsc-inspect model.json --all
//! CDSC_LOG="cdsc_resolver::topology=trace" cdsc-inspect model.json -p definitions/V/query
//! ```
//!
//! Nothing is installed unless `CDSC_LOG` (or `RUST_LOG`) is set.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Standard flat text lines (default).
    Text,
    /// Hierarchical indented tree via `tracing-tree`.
    Tree,
    /// Newline-delimited JSON objects.
    Json,
}

impl LogFormat {
    /// Parse a `CDSC_LOG_FORMAT` value; anything unknown is `Text`.
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "tree" => Self::Tree,
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    fn from_env() -> Self {
        Self::parse(&std::env::var("CDSC_LOG_FORMAT").unwrap_or_default())
    }
}

/// `CDSC_LOG` takes precedence over `RUST_LOG`.
fn build_filter() -> EnvFilter {
    if let Ok(val) = std::env::var("CDSC_LOG") {
        EnvFilter::builder().parse_lossy(val)
    } else {
        EnvFilter::from_default_env()
    }
}

/// Initialise the global tracing subscriber, writing to stderr.
///
/// Does nothing when neither `CDSC_LOG` nor `RUST_LOG` is set.
pub fn init_tracing() {
    if std::env::var("CDSC_LOG").is_err() && std::env::var("RUST_LOG").is_err() {
        return;
    }

    let filter = build_filter();
    match LogFormat::from_env() {
        LogFormat::Tree => {
            let tree_layer = tracing_tree::HierarchicalLayer::default()
                .with_indent_amount(2)
                .with_indent_lines(true)
                .with_deferred_spans(true)
                .with_span_retrace(true)
                .with_targets(true);

            Registry::default().with(filter).with(tree_layer).init();
        }
        LogFormat::Json => {
            let json_layer = fmt::layer().json().with_writer(std::io::stderr);

            Registry::default().with(filter).with(json_layer).init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
