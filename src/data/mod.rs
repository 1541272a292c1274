//! Market data module.
//!
//! Per-ticker price/volume history and fundamentals come from Yahoo Finance
//! through the [`QuoteProvider`] trait; promoter shareholding comes from the
//! semi-public NSE quote-equity endpoint through [`PromoterSource`]. Both
//! seams are traits so the screening engine can run against in-memory fakes.

mod nse;
mod provider;
mod throttle;
mod yahoo;

pub use nse::{PromoterFetcher, PromoterOutcome, PromoterSnapshot, PromoterSource};
pub use provider::{FetchError, QuoteProvider};
pub use throttle::Throttle;
pub use yahoo::YahooProvider;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// One daily price/volume bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Fundamental valuation/growth/quality fields at fetch time.
///
/// Every field is optional: free data sources are patchy, and a missing
/// field means the corresponding criterion is simply not evaluated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub market_cap: Option<f64>,
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub ev_ebitda: Option<f64>,
    /// Return on equity (%)
    pub roe: Option<f64>,
    /// Return on capital employed (%)
    pub roce: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub interest_coverage: Option<f64>,
    /// 3-year revenue CAGR (%)
    pub revenue_cagr_3y: Option<f64>,
    /// 3-year EPS CAGR (%)
    pub eps_cagr_3y: Option<f64>,
}

/// Per-ticker snapshot held in memory for the duration of a run.
#[derive(Debug, Clone)]
pub struct QuoteRecord {
    pub ticker: String,
    /// Daily bars, oldest first
    pub bars: Vec<PriceBar>,
    pub fundamentals: FundamentalSnapshot,
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Compound annual growth rate in percent, or None when undefined
/// (non-positive endpoints or a zero span).
pub(crate) fn cagr_percent(first: f64, last: f64, years: f64) -> Option<f64> {
    if first <= 0.0 || last <= 0.0 || years <= 0.0 {
        return None;
    }
    Some(((last / first).powf(1.0 / years) - 1.0) * 100.0)
}

/// Coerce a JSON-ish float into a finite `Option<f64>`.
pub(crate) fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cagr_percent() {
        // Doubling over 3 years is ~26% CAGR
        let cagr = cagr_percent(100.0, 200.0, 3.0).unwrap();
        assert!((cagr - 25.992).abs() < 0.01);

        // Flat is 0%
        assert!(cagr_percent(100.0, 100.0, 3.0).unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn test_cagr_percent_undefined_inputs() {
        assert!(cagr_percent(-5.0, 100.0, 3.0).is_none());
        assert!(cagr_percent(100.0, 0.0, 3.0).is_none());
        assert!(cagr_percent(100.0, 200.0, 0.0).is_none());
    }

    #[test]
    fn test_finite_filters_nan() {
        assert_eq!(finite(Some(1.5)), Some(1.5));
        assert_eq!(finite(Some(f64::NAN)), None);
        assert_eq!(finite(Some(f64::INFINITY)), None);
        assert_eq!(finite(None), None);
    }
}
