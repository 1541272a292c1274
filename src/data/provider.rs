//! Quote provider abstraction.
//!
//! Defines the `QuoteProvider` trait implemented by the Yahoo adapter in
//! production and by in-memory fakes in tests.

use async_trait::async_trait;
use thiserror::Error;

use super::{FundamentalSnapshot, PriceBar};

// ============================================================================
// Fetch Error
// ============================================================================

/// Errors from a quote provider.
///
/// A failure for one ticker never aborts the batch: the screening engine
/// logs it, records the ticker as excluded, and continues.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Connection failure or timeout
    #[error("network error: {0}")]
    Network(String),

    /// Upstream throttling (HTTP 429)
    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The provider has no data for this ticker
    #[error("data not available: {0}")]
    DataNotAvailable(String),

    /// Response body did not match the expected shape
    #[error("parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Whether a retry against the same provider could plausibly succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited { .. })
    }
}

// ============================================================================
// Quote Provider Trait
// ============================================================================

/// Source of per-ticker price history and fundamentals.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Provider name for logging (e.g., "yahoo").
    fn name(&self) -> &'static str;

    /// Fetch daily bars for a ticker, oldest first.
    ///
    /// `lookback_days` is the calendar window to request; the provider may
    /// return fewer bars (holidays, recent listings).
    async fn fetch_history(
        &self,
        ticker: &str,
        lookback_days: u32,
    ) -> Result<Vec<PriceBar>, FetchError>;

    /// Fetch the fundamental snapshot for a ticker.
    ///
    /// Individual fields may be absent; a hard error here degrades the
    /// ticker's fundamental dimensions to "not evaluated" rather than
    /// excluding it from the run.
    async fn fetch_fundamentals(&self, ticker: &str) -> Result<FundamentalSnapshot, FetchError>;
}

// ============================================================================
// Tests
// ============================================================================
