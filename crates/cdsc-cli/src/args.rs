use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the cdsc-inspect binary.
#[derive(Parser, Debug)]
#[command(
    name = "cdsc-inspect",
    version,
    about = "Resolve references in a compiled schema document"
)]
pub struct CliArgs {
    /// Compiled schema document (JSON).
    pub input: PathBuf,

    // ==================== Selection ====================
    /// Document path of a reference or member, e.g. `definitions/V/query/SELECT/columns/0`.
    #[arg(short = 'p', long = "path")]
    pub paths: Vec<String>,

    /// Inspect every reference (of `--definition`, or of all definitions).
    #[arg(long)]
    pub all: bool,

    /// Restrict `--all` and `--snapshot` to one definition.
    #[arg(short = 'd', long)]
    pub definition: Option<String>,

    // ==================== Reports ====================
    /// Report the origin of each selected member.
    #[arg(long)]
    pub origin: bool,

    /// Report the effective type of each selected member.
    #[arg(long = "effective-type")]
    pub effective_type: bool,

    /// Report source locations and semantic locations of each reference.
    #[arg(long)]
    pub locations: bool,

    /// Dump the cached facts of the selected definitions after resolving.
    #[arg(long)]
    pub snapshot: bool,

    // ==================== Session ====================
    /// Skip query columns without a result member instead of failing.
    #[arg(long = "tolerate-partial")]
    pub tolerate_partial: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, ignore_case = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl CliArgs {
    /// Whether any member-level report was requested.
    pub fn wants_members(&self) -> bool {
        self.origin || self.effective_type
    }
}
