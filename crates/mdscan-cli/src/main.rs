//! mdscan - look a file up on MetaDefender Cloud, uploading it if needed.
//!
//! Usage:
//!   mdscan ./sample.exe --api-key <KEY>
//!   METADEFENDER_API_KEY=<KEY> mdscan ./sample.exe --format json
//!   mdscan ./sample.exe --poll-interval 5 --max-attempts 12 -v

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use mdscan_core::config::{API_KEY_ENV, DEFAULT_BASE_URL};
use mdscan_core::poll::ThreadSleeper;
use mdscan_core::report::{print_report, OutputFormat};
use mdscan_core::{run_scan, ClientConfig, MetaDefenderClient};

#[derive(Parser)]
#[command(name = "mdscan")]
#[command(about = "Scan a file with MetaDefender Cloud")]
struct Cli {
    /// File to scan
    path: PathBuf,

    /// MetaDefender API key
    #[arg(short = 'k', long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: String,

    /// API base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Seconds to wait between poll attempts
    #[arg(long, default_value = "10")]
    poll_interval: u64,

    /// Poll attempts before giving up
    #[arg(long, default_value = "6")]
    max_attempts: u32,

    /// Per-request timeout in seconds (0 disables it)
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "mdscan=debug,mdscan_core=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let timeout = (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout));
    let config = ClientConfig::new(cli.api_key)?
        .with_base_url(cli.base_url)
        .with_poll_interval(Duration::from_secs(cli.poll_interval))
        .with_max_poll_attempts(cli.max_attempts)?
        .with_request_timeout(timeout);

    let client = MetaDefenderClient::new(config)?;
    let mut sleeper = ThreadSleeper::new();

    let report = run_scan(&client, &cli.path, &mut sleeper)
        .with_context(|| format!("Failed to scan {}", cli.path.display()))?;

    print_report(&report, cli.format).context("Failed to write scan report")?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
