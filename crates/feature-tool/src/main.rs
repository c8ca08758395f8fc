//! featkit - Main Entry Point

use clap::Parser;
use feature_tool::{init_logging, run, Cli};
use tracing::debug;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose)?;

    debug!("featkit v{}", env!("CARGO_PKG_VERSION"));
    let stdout = std::io::stdout();
    run(&cli, &mut stdout.lock())
}
