use anyhow::Result;
use clap::Parser;
use std::io::Write;

use cdsc_cli::args::CliArgs;
use cdsc_cli::driver;

/// Exit status when at least one reference failed to resolve.
const EXIT_MODEL_ERRORS: i32 = 1;

fn main() -> Result<()> {
    // Zero cost unless CDSC_LOG or RUST_LOG is set.
    cdsc_cli::tracing_config::init_tracing();

    let args = CliArgs::parse();
    let report = driver::run(&args)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    driver::write_report(&report, args.format, &mut out)?;
    out.flush()?;

    if report.has_errors() {
        std::process::exit(EXIT_MODEL_ERRORS);
    }
    Ok(())
}
