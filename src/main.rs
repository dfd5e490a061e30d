//! fswatcher - watch directories and forward normalized file change events.

mod actor;
mod cli;
mod config;
mod core;
mod logger;
mod report;
mod sink;
mod utils;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use serde_json::json;

use actor::Coordinator;
use cli::Cli;
use config::WatchConfig;
use crate::core::{Lifecycle, setup_shutdown_handler};
use report::{LogReporter, Reporter, Tags};
use sink::ConfiguredSink;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = WatchConfig::load(&cli.config)
        .with_context(|| format!("failed loading config {}", cli.config.display()))?;

    let reporter: Arc<dyn Reporter> =
        Arc::new(LogReporter::new(Tags::from_env(config.build.as_deref())));
    let lifecycle = Arc::new(Lifecycle::new());
    setup_shutdown_handler(Arc::clone(&lifecycle))?;

    let sink = Arc::new(ConfiguredSink::from_config(&config.sink));
    crate::debug!("dispatch"; "delivering to {}", config.sink.name());

    let coordinator = Coordinator::from_config(&config, sink, Arc::clone(&reporter), lifecycle);

    if let Err(e) = block_on_detached(coordinator.run())? {
        reporter.report(
            "unexpected termination",
            Some(&json!({ "error": format!("{e:#}") })),
        );
        return Err(e);
    }

    Ok(())
}

/// Run `future` to completion on a fresh runtime.
///
/// Deliveries still running on the blocking pool are abandoned.
fn block_on_detached<F: Future>(future: F) -> Result<F::Output> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let output = rt.block_on(future);
    rt.shutdown_background();
    Ok(output)
}
