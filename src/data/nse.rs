//! Promoter shareholding fetcher for the NSE quote-equity endpoint.
//!
//! The endpoint is semi-public: it requires session cookies primed from the
//! NSE homepage, rejects non-browser user agents, and may start refusing
//! automated access at any time. The contract here is degrade-gracefully:
//! after a bounded retry the fetcher returns [`PromoterOutcome::Unavailable`]
//! rather than an error, and callers treat that the same as "not applicable".

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::universe::BROWSER_USER_AGENT;

use super::provider::FetchError;
use super::Throttle;

const NSE_HOME_URL: &str = "https://www.nseindia.com/";
const NSE_QUOTE_URL: &str = "https://www.nseindia.com/api/quote-equity";

// ============================================================================
// Promoter Types
// ============================================================================

/// Quarter-over-quarter promoter holding snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromoterSnapshot {
    /// Latest reported promoter holding (%)
    pub latest_percent: f64,
    /// Previous quarter's holding (%), when at least two quarters exist
    pub prev_percent: Option<f64>,
    /// Latest minus previous, in percentage points
    pub change_qoq_pct_pts: Option<f64>,
}

/// Outcome of a promoter fetch. Never an error: "unavailable" is an
/// expected state of this data source, not a failure of the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PromoterOutcome {
    Available(PromoterSnapshot),
    Unavailable,
}

impl PromoterOutcome {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn snapshot(&self) -> Option<&PromoterSnapshot> {
        match self {
            Self::Available(s) => Some(s),
            Self::Unavailable => None,
        }
    }
}

/// Source of promoter-activity data. A trait so the screening engine can
/// run against fakes in tests.
#[async_trait]
pub trait PromoterSource: Send + Sync {
    /// Fetch the promoter snapshot for an NSE root symbol (no `.NS` suffix).
    async fn fetch(&self, nse_symbol: &str) -> PromoterOutcome;
}

// ============================================================================
// Promoter Fetcher
// ============================================================================

/// Best-effort promoter shareholding fetcher against the NSE endpoint.
pub struct PromoterFetcher {
    client: reqwest::Client,
    throttle: Throttle,
    retries: u32,
    primed: OnceCell<()>,
}

impl PromoterFetcher {
    /// Create a fetcher with pacing, timeout, and retry budget from config.
    pub fn new(run: &RunConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(run.http_timeout_secs))
            .user_agent(BROWSER_USER_AGENT)
            .cookie_store(true)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            throttle: Throttle::from_millis(run.download_pause_ms),
            retries: run.promoter_retries.max(1),
            primed: OnceCell::new(),
        }
    }

    /// Prime session cookies by hitting the homepage once per run.
    /// Failure is ignored; the quote request itself will tell us.
    async fn prime_cookies(&self) {
        self.primed
            .get_or_init(|| async {
                match self.client.get(NSE_HOME_URL).send().await {
                    Ok(_) => debug!("Primed NSE session cookies"),
                    Err(e) => warn!(error = %e, "Failed to prime NSE session cookies"),
                }
            })
            .await;
    }

    async fn try_fetch(&self, nse_symbol: &str) -> Result<Option<PromoterSnapshot>, FetchError> {
        self.throttle.wait().await;

        let response = self
            .client
            .get(NSE_QUOTE_URL)
            .query(&[("symbol", nse_symbol), ("section", "shareholding")])
            .header("Accept", "*/*")
            .header("Referer", NSE_HOME_URL)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 || status.as_u16() == 403 {
            // 403 here is the endpoint blocking automation, same handling
            return Err(FetchError::RateLimited {
                retry_after_secs: None,
            });
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("HTTP {status} from NSE")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        Ok(parse_promoter_series(&body))
    }
}

#[async_trait]
impl PromoterSource for PromoterFetcher {
    async fn fetch(&self, nse_symbol: &str) -> PromoterOutcome {
        self.prime_cookies().await;

        for attempt in 1..=self.retries {
            match self.try_fetch(nse_symbol).await {
                Ok(Some(snapshot)) => {
                    debug!(
                        symbol = nse_symbol,
                        latest = snapshot.latest_percent,
                        change = ?snapshot.change_qoq_pct_pts,
                        "Fetched promoter shareholding"
                    );
                    return PromoterOutcome::Available(snapshot);
                }
                // Parsed fine but no promoter series: retrying won't help.
                Ok(None) => {
                    debug!(symbol = nse_symbol, "No promoter series in response");
                    return PromoterOutcome::Unavailable;
                }
                Err(e) => {
                    if !e.is_recoverable() || attempt == self.retries {
                        warn!(
                            symbol = nse_symbol,
                            attempt,
                            error = %e,
                            "Promoter data unavailable, degrading"
                        );
                        return PromoterOutcome::Unavailable;
                    }
                    let backoff = Duration::from_secs(1u64 << (attempt - 1).min(4));
                    debug!(
                        symbol = nse_symbol,
                        attempt,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "Promoter fetch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        PromoterOutcome::Unavailable
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Pull the promoter category's quarterly series out of the shareholding
/// payload. The shape drifts, so this is deliberate best-effort navigation
/// over `serde_json::Value` rather than a rigid schema.
fn parse_promoter_series(body: &serde_json::Value) -> Option<PromoterSnapshot> {
    let categories = body.get("shareholding")?.get("data")?.as_array()?;

    let promoter = categories.iter().find(|cat| {
        cat.get("category")
            .and_then(|c| c.as_str())
            .is_some_and(|c| c.trim().to_lowercase().starts_with("promoter"))
    })?;

    let mut entries: Vec<(&str, f64)> = promoter
        .get("data")?
        .as_array()?
        .iter()
        .filter_map(|entry| {
            let percent = coerce_percent(entry.get("percent")?)?;
            let quarter = entry
                .get("quarterBeginDate")
                .or_else(|| entry.get("quarterEndDate"))
                .and_then(|q| q.as_str())
                .unwrap_or("");
            Some((quarter, percent))
        })
        .collect();

    if entries.is_empty() {
        return None;
    }

    // ISO-style quarter dates sort lexicographically
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let latest_percent = entries[entries.len() - 1].1;
    let prev_percent = entries
        .len()
        .checked_sub(2)
        .map(|i| entries[i].1);

    Some(PromoterSnapshot {
        latest_percent,
        prev_percent,
        change_qoq_pct_pts: prev_percent.map(|prev| latest_percent - prev),
    })
}

/// The endpoint serves percentages as numbers or strings depending on age.
fn coerce_percent(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
