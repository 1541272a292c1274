//! NIFTY screener CLI.
//!
//! Loads the index universe, screens every ticker against the threshold
//! rules, and writes the ranked CSV report.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nifty_screener::config::ScreenerConfig;
use nifty_screener::data::{PromoterFetcher, YahooProvider};
use nifty_screener::screen::{ReportWriter, ScreenEngine, ScreenSide};
use nifty_screener::universe::{NiftyIndex, UniverseLoader};

/// Noisy library modules filtered to warn unless RUST_LOG overrides.
const NOISY_MODULES: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

#[derive(Parser, Debug)]
#[command(name = "nifty-screener")]
#[command(version)]
#[command(about = "Threshold screener for NSE-listed stocks", long_about = None)]
struct Cli {
    /// Index universe to screen (NIFTY50, NIFTY200, NIFTY500)
    #[arg(long, default_value = "NIFTY500")]
    universe: NiftyIndex,

    /// Screen only the first N constituents (useful for quick runs)
    #[arg(long)]
    limit: Option<usize>,

    /// Run the buy-side screen (default)
    #[arg(long)]
    buy: bool,

    /// Run the sell-side screen (no technical prefilter)
    #[arg(long)]
    sell: bool,

    /// Output CSV path
    #[arg(long, default_value = "results.csv")]
    out: PathBuf,

    /// JSON config file overriding the default thresholds
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut directives = String::from("info");
        for module in NOISY_MODULES {
            directives.push_str(&format!(",{module}=warn"));
        }
        EnvFilter::new(directives)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();
    let cli = Cli::parse();
    init_logging();

    if cli.buy && cli.sell {
        bail!("Use either --buy or --sell, not both");
    }
    let side = if cli.sell {
        ScreenSide::Sell
    } else {
        ScreenSide::Buy
    };

    info!("nifty-screener v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ScreenerConfig::load(cli.config.as_deref())?;
    config.universe.index = cli.universe;
    if cli.limit.is_some() {
        config.universe.limit = cli.limit;
    }
    info!(thresholds = %config.summary(), "Configuration loaded");

    let loader = UniverseLoader::new(
        &config.universe,
        Duration::from_secs(config.run.http_timeout_secs),
    );
    let universe = loader.load().await?;

    let provider = Arc::new(YahooProvider::new(&config.run));
    let promoter = Arc::new(PromoterFetcher::new(&config.run));
    let engine = ScreenEngine::new(config, provider, promoter);

    info!(
        duration_ms = startup_start.elapsed().as_millis() as u64,
        "Initialized, starting screen"
    );

    let run = engine.run(&universe, side).await?;
    ReportWriter::new().write_to_path(&run, &cli.out)?;
    info!(
        rows = run.results.len(),
        path = %cli.out.display(),
        "Wrote report"
    );

    Ok(())
}
