use std::path::PathBuf;

use anyhow::{Context, Result};
use bill_scraper::config::{Overrides, RefreshMode, SyncConfig};
use bill_scraper::live_engine;
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bill-scraper")]
#[command(about = "Scrapes legislative sessions, bills and bill statuses into CSV snapshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the snapshots, re-scraping only sessions that may have changed
    Sync {
        #[command(flatten)]
        run: RunArgs,
        /// Hide the status progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// List the sessions the next sync would re-scrape, without writing anything
    Plan {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Re-scrape every session
    #[arg(long, conflicts_with = "current")]
    full: bool,
    /// Re-scrape only the most recent session
    #[arg(long)]
    current: bool,
    /// Directory holding sessions.csv, bills.csv and statuses.csv
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Site root the session listing and relative links resolve against
    #[arg(long)]
    root_url: Option<String>,
    /// Pause between consecutive requests, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
    /// Per-request timeout, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl RunArgs {
    fn overrides(self, progress: bool) -> Overrides {
        Overrides {
            root_url: self.root_url,
            data_dir: self.data_dir,
            delay_ms: self.delay_ms,
            timeout_secs: self.timeout_secs,
            mode: RefreshMode::from_flags(self.full, self.current),
            progress,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env().context("invalid environment configuration")?;

    match cli.command {
        Commands::Sync { run, no_progress } => sync(config.with_overrides(run.overrides(!no_progress))).await,
        Commands::Plan { run } => plan(config.with_overrides(run.overrides(false))).await,
    }
}

async fn sync(config: SyncConfig) -> Result<()> {
    tracing::info!(
        url = %config.sessions_url(),
        data_dir = %config.data_dir.display(),
        mode = ?config.mode,
        "starting sync"
    );
    let engine = live_engine(&config)?;
    let report = engine.run().await?;

    tracing::info!(
        sessions = report.sessions,
        refreshed = report.plan.len(),
        bills_retained = report.bills_retained,
        bills_fetched = report.bills_fetched,
        statuses_retained = report.statuses_retained,
        statuses_fetched = report.statuses_fetched,
        "sync complete"
    );
    Ok(())
}

async fn plan(config: SyncConfig) -> Result<()> {
    let engine = live_engine(&config)?;
    let plan = engine.plan().await?;

    if plan.is_empty() {
        println!("No session needs refreshing.");
    }
    for (name, reason) in plan.reasons() {
        println!("{name}\t{reason}");
    }
    Ok(())
}
