use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Result, bail};
use chrono::{DateTime, FixedOffset, Utc};
use clap::Parser;
use edgarsnap::{ScanConfig, ScanError, Scanner, record_startup_failure};

const DEFAULT_CONFIG: &str = "edgarsnap.toml";

/// Exit status when `--require-boundary` is set and the run did not reach its window start.
const EXIT_BOUNDARY_NOT_REACHED: u8 = 3;

#[derive(Debug, Parser)]
#[command(name = "edgarsnap", version, about = "Daily SEC EDGAR filing snapshot")]
struct Cli {
    /// TOML configuration file (default: ./edgarsnap.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// SEC.gov-required contact identity (e.g. "MyApp you@example.com").
    #[arg(long, env = "EDGARSNAP_CONTACT")]
    contact: Option<String>,

    /// Directory the artifacts are written to.
    #[arg(long, env = "EDGARSNAP_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Pin the invocation instant (RFC 3339) to re-run a past window.
    #[arg(long, value_parser = DateTime::parse_from_rfc3339)]
    now: Option<DateTime<FixedOffset>>,

    /// Exit non-zero unless the scan saw entries and reached the window's trading day.
    #[arg(long)]
    require_boundary: bool,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "edgarsnap=info",
        1 => "edgarsnap=debug",
        _ => "edgarsnap=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn load_config(cli: &Cli) -> edgarsnap::Result<ScanConfig> {
    let mut config = match &cli.config {
        Some(path) => ScanConfig::load_from(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            ScanConfig::load_from(Path::new(DEFAULT_CONFIG))?
        }
        None => ScanConfig::default(),
    };

    if let Some(contact) = &cli.contact {
        config.contact_identity = contact.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

/// Writes the failed-run stats for `error`, then turns it into the process error.
fn startup_failure(output_dir: &Path, timezone: &str, error: ScanError) -> anyhow::Error {
    if let Err(e) = record_startup_failure(output_dir, timezone, &error) {
        tracing::error!(error = %e, "could not write stats artifact");
    }
    anyhow::Error::new(error).context("invalid configuration")
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(error) => {
            let defaults = ScanConfig::default();
            let output_dir = cli.output_dir.clone().unwrap_or(defaults.output_dir);
            return Err(startup_failure(&output_dir, &defaults.timezone, error));
        }
    };
    let output_dir = config.output_dir.clone();
    let timezone = config.timezone.clone();
    let scanner = match Scanner::new(config) {
        Ok(scanner) => scanner,
        Err(error) => return Err(startup_failure(&output_dir, &timezone, error)),
    };

    let now = cli
        .now
        .map(|instant| instant.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let report = scanner.run(now).await;
    let stats = &report.stats;

    if let Some(error) = report.error {
        bail!(
            "scan failed ({}): {}; stats written to {}",
            error.kind(),
            error,
            scanner.config().output_dir.display()
        );
    }

    println!(
        "{} filings written to {} ({} seen, {} outside window, {} banned, {} skipped)",
        stats.records_written,
        scanner.config().output_dir.display(),
        stats.entries_seen,
        stats.entries_outside_window,
        stats.entries_banned,
        stats.entries_skipped
    );

    if cli.require_boundary && !stats.passed() {
        tracing::warn!(
            hit_boundary = stats.hit_boundary,
            entries_seen = stats.entries_seen,
            "window start not reached"
        );
        return Ok(ExitCode::from(EXIT_BOUNDARY_NOT_REACHED));
    }

    Ok(ExitCode::SUCCESS)
}
