mod app;
mod config;
mod sinks;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;

use app::{Cli, resolve_output_format, resolve_runtime, run};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("CLI: Failed to initialize thread pool")?;
    }

    let runtime = resolve_runtime(&cli)?;
    let format = resolve_output_format(&cli)?;
    tracing::info!(
        "Input: {:?} ({}), grammar {:?}, batch size {}",
        cli.input,
        runtime.input_format.label(),
        runtime.grammar,
        runtime.batch_size
    );

    let start = std::time::Instant::now();
    let stats = run(&cli, &runtime, format)?;

    let elapsed = start.elapsed();
    if stats.failed > 0 {
        tracing::warn!("{} rows could not be evaluated", stats.failed);
    }
    tracing::info!(
        "Done! Matched {} of {} rows in {:.2}s ({} rows/s)",
        stats.matched,
        stats.scanned,
        elapsed.as_secs_f64(),
        (stats.scanned as f64 / elapsed.as_secs_f64()) as u64
    );

    Ok(())
}
