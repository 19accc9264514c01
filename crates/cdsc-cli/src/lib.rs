//! Inspection front end for the cdsc name-resolution engine.
//!
//! - [`args`]: command-line flags of `cdsc-inspect`
//! - [`driver`]: loads a compiled schema document and collects a [`driver::Report`]
//! - [`tracing_config`]: opt-in `tracing` subscriber setup

pub mod args;
pub mod driver;
pub mod tracing_config;
