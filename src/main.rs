mod api;
mod cli;
mod logging;
mod metrics;
mod model;
mod notice;
mod orchestrator;
mod pagination;
mod runner;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::{Context, Result};
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // The local offset can only be read while the process is single-threaded.
    metrics::init_local_offset();
    let _log_guard = logging::init(args.log_target())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(cli::run(args))
}
