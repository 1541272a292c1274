//! Universe loader for NSE index constituents.
//!
//! Downloads the membership CSV for a NIFTY index from the NSE archives and
//! normalizes it into an ordered, de-duplicated list of Yahoo-style tickers
//! (`SYMBOL.NS`). Universe load failure is the one fatal error of a run:
//! with no tickers there is nothing to screen.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::UniverseConfig;

/// Browser-like user agent. The NSE archive host rejects default HTTP
/// client user agents.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Attempts before a universe load is declared fatal.
const LOAD_ATTEMPTS: u32 = 3;

// ============================================================================
// Index Selection
// ============================================================================

/// Supported NIFTY index membership lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NiftyIndex {
    Nifty50,
    Nifty200,
    #[default]
    Nifty500,
}

impl NiftyIndex {
    /// NSE archives URL for this index's constituents CSV.
    pub fn csv_url(&self) -> &'static str {
        match self {
            Self::Nifty50 => "https://archives.nseindia.com/content/indices/ind_nifty50list.csv",
            Self::Nifty200 => "https://archives.nseindia.com/content/indices/ind_nifty200list.csv",
            Self::Nifty500 => "https://archives.nseindia.com/content/indices/ind_nifty500list.csv",
        }
    }
}

impl std::fmt::Display for NiftyIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nifty50 => write!(f, "NIFTY50"),
            Self::Nifty200 => write!(f, "NIFTY200"),
            Self::Nifty500 => write!(f, "NIFTY500"),
        }
    }
}

impl std::str::FromStr for NiftyIndex {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NIFTY50" => Ok(Self::Nifty50),
            "NIFTY200" => Ok(Self::Nifty200),
            "NIFTY500" => Ok(Self::Nifty500),
            _ => Err(format!("Unsupported index: {s}")),
        }
    }
}

// ============================================================================
// Ticker Mapping
// ============================================================================

/// Map an NSE root symbol to the Yahoo Finance ticker form.
pub fn to_yahoo_ticker(nse_symbol: &str) -> String {
    format!("{}.NS", nse_symbol.trim().to_uppercase())
}

/// Strip the Yahoo `.NS` suffix back to the NSE root symbol.
pub fn to_nse_root(ticker: &str) -> &str {
    ticker.strip_suffix(".NS").unwrap_or(ticker)
}

// ============================================================================
// Universe Loader
// ============================================================================

/// Downloads and normalizes an index membership list.
pub struct UniverseLoader {
    client: reqwest::Client,
    index: NiftyIndex,
    limit: Option<usize>,
}

impl UniverseLoader {
    /// Create a loader for the configured index.
    pub fn new(config: &UniverseConfig, http_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(http_timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            index: config.index,
            limit: config.limit,
        }
    }

    /// Fetch and normalize the universe.
    ///
    /// Retries transient failures a few times, then propagates the error:
    /// the caller is expected to abort the run without writing any output.
    pub async fn load(&self) -> Result<Vec<String>> {
        let url = self.index.csv_url();

        let mut last_err = None;
        for attempt in 1..=LOAD_ATTEMPTS {
            match self.fetch_csv(url).await {
                Ok(body) => {
                    let tickers = parse_constituents(&body, self.limit)?;
                    info!(
                        index = %self.index,
                        tickers = tickers.len(),
                        "Universe loaded"
                    );
                    return Ok(tickers);
                }
                Err(e) => {
                    warn!(
                        index = %self.index,
                        attempt,
                        max_attempts = LOAD_ATTEMPTS,
                        error = %e,
                        "Universe fetch failed"
                    );
                    last_err = Some(e);
                    if attempt < LOAD_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("universe fetch failed")))
            .with_context(|| format!("Failed to load {} constituents from {url}", self.index))
    }

    async fn fetch_csv(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/csv,text/plain,*/*")
            .header("Referer", "https://www.nseindia.com/")
            .send()
            .await
            .context("Failed to send request to NSE archives")?;

        if !response.status().is_success() {
            bail!("NSE archives returned HTTP {}", response.status());
        }

        // NSE index CSVs are occasionally Windows-1252; lossy decoding keeps
        // the ASCII Symbol column intact either way.
        let bytes = response.bytes().await.context("Failed to read CSV body")?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Parse an index constituents CSV into ordered, de-duplicated tickers.
fn parse_constituents(body: &str, limit: Option<usize>) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader.headers().context("Constituents CSV has no header")?;
    let symbol_idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("symbol"))
        .context("Symbol column not found in index CSV")?;

    let mut seen = HashSet::new();
    let mut tickers = Vec::new();

    for record in reader.records() {
        let record = record.context("Malformed row in index CSV")?;
        let Some(raw) = record.get(symbol_idx) else {
            continue;
        };
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() {
            continue;
        }
        if seen.insert(symbol.clone()) {
            tickers.push(to_yahoo_ticker(&symbol));
        }
    }

    if tickers.is_empty() {
        bail!("Index CSV contained no symbols");
    }

    if let Some(max) = limit {
        tickers.truncate(max);
    }

    debug!(count = tickers.len(), "Parsed constituents");
    Ok(tickers)
}

// ============================================================================
// Tests
// ============================================================================
