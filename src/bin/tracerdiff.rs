//! tracerdiff CLI tool
//!
//! Fetches the same blocks through a full-tracer client and a lean-tracer
//! client and stops at the first block whose operations differ.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracerdiff::client::TraceClient;
use tracerdiff::comparator::{Comparator, DEFAULT_ITERATIONS};
use tracerdiff::config::Configuration;
use tracerdiff::diff::CompareMode;
use tracerdiff::profiling::CpuProfiler;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tracerdiff")]
#[command(about = "Compare full and lean tracer output, block by block")]
struct Cli {
    /// The block number whose transactions to trace (checked descending from here)
    #[arg(long)]
    block: u64,

    /// Write CPU profile to `FILE`
    #[arg(long, value_name = "FILE")]
    cpuprofile: Option<PathBuf>,

    /// Number of blocks to check
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: u64,

    /// Tracer script of the reference client
    #[arg(long, env = "FULL_TRACER_PATH", default_value = "../call_tracer.js")]
    full_tracer: PathBuf,

    /// Tracer script of the lean client
    #[arg(long, env = "LEAN_TRACER_PATH", default_value = "../call_tracer_lean.js")]
    lean_tracer: PathBuf,

    /// Compare operations within a transaction as a multiset instead of by position
    #[arg(long)]
    unordered: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // `.env` may provide BOR_URL and friends as well as clap env fallbacks
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Dropped when run returns, on both the success and the error path
    let _profiler = cli
        .cpuprofile
        .as_deref()
        .map(CpuProfiler::start)
        .transpose()
        .context("Couldn't start CPU profiling")?;

    let cfg = Configuration::load().context("Couldn't load configuration")?;

    let full = TraceClient::new(cfg.client_config(cli.full_tracer.clone(), false))
        .context("Couldn't create default client")?;
    let lean = TraceClient::new(cfg.client_config(cli.lean_tracer.clone(), true))
        .context("Couldn't create client with lean tracer")?;

    info!(
        url = %cfg.bor_url,
        network = %cfg.params.network,
        start = cli.block,
        iterations = cli.iterations,
        "comparing full and lean tracers"
    );

    let mode = if cli.unordered {
        CompareMode::Unordered
    } else {
        CompareMode::Positional
    };
    let mut comparator = Comparator::new(full, lean, cli.block, std::io::stdout()).with_mode(mode);
    let summary = comparator.run(cli.iterations).await?;

    info!(
        blocks = summary.blocks,
        full = ?summary.total1,
        lean = ?summary.total2,
        "no divergence found"
    );
    Ok(())
}
