//! Screener configuration.
//!
//! Defines the named thresholds for every screening dimension plus the
//! run-level knobs (lookback window, pacing, phase caps). All fields carry
//! serde defaults so a partial JSON file overlays the built-in values.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::universe::NiftyIndex;

// ============================================================================
// Main Screener Configuration
// ============================================================================

/// Top-level configuration for a screening run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Universe selection
    #[serde(default)]
    pub universe: UniverseConfig,

    /// Valuation thresholds
    #[serde(default)]
    pub valuation: ValuationConfig,

    /// Growth thresholds
    #[serde(default)]
    pub growth: GrowthConfig,

    /// Quality thresholds
    #[serde(default)]
    pub quality: QualityConfig,

    /// Promoter-activity thresholds
    #[serde(default)]
    pub promoter: PromoterConfig,

    /// Technical-trend thresholds
    #[serde(default)]
    pub technical: TechnicalConfig,

    /// Run-level knobs (lookback, pacing, caps)
    #[serde(default)]
    pub run: RunConfig,
}

impl ScreenerConfig {
    /// Load configuration, overlaying a JSON file onto the defaults when a
    /// path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(Self::default()),
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file {}", p.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse config file {}", p.display()))
            }
        }
    }

    /// One-line summary of the active thresholds, for logging.
    pub fn summary(&self) -> String {
        format!(
            "PE {}-{}, PB<{}, RevCAGR>{}%, ROE>{}%, D/E<{}, PromQoQ>+{}pp",
            self.valuation.min_pe,
            self.valuation.max_pe,
            self.valuation.max_pb,
            self.growth.min_revenue_cagr_3y,
            self.quality.min_roe,
            self.quality.max_debt_to_equity,
            self.promoter.min_change_qoq_pct_pts,
        )
    }
}

// ============================================================================
// Universe Configuration
// ============================================================================

/// Which index membership list forms the screening universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Index whose constituents form the universe
    #[serde(default)]
    pub index: NiftyIndex,

    /// Cap on the number of tickers, for quick runs (None = all)
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            index: NiftyIndex::Nifty500,
            limit: None,
        }
    }
}

// ============================================================================
// Dimension Thresholds
// ============================================================================

/// Valuation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationConfig {
    /// Minimum trailing PE (excludes distressed / loss-making names)
    #[serde(default = "default_min_pe")]
    pub min_pe: f64,

    /// Maximum trailing PE
    #[serde(default = "default_max_pe")]
    pub max_pe: f64,

    /// Maximum price-to-book
    #[serde(default = "default_max_pb")]
    pub max_pb: f64,

    /// Maximum EV/EBITDA; None disables the check (the field is missing for
    /// many names on free data sources)
    #[serde(default = "default_max_ev_ebitda")]
    pub max_ev_ebitda: Option<f64>,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            min_pe: default_min_pe(),
            max_pe: default_max_pe(),
            max_pb: default_max_pb(),
            max_ev_ebitda: default_max_ev_ebitda(),
        }
    }
}

fn default_min_pe() -> f64 {
    5.0
}

fn default_max_pe() -> f64 {
    35.0
}

fn default_max_pb() -> f64 {
    6.0
}

fn default_max_ev_ebitda() -> Option<f64> {
    Some(20.0)
}

/// Growth thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthConfig {
    /// Minimum 3-year revenue CAGR (%)
    #[serde(default = "default_min_cagr")]
    pub min_revenue_cagr_3y: f64,

    /// Minimum 3-year EPS CAGR (%)
    #[serde(default = "default_min_cagr")]
    pub min_eps_cagr_3y: f64,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            min_revenue_cagr_3y: default_min_cagr(),
            min_eps_cagr_3y: default_min_cagr(),
        }
    }
}

fn default_min_cagr() -> f64 {
    10.0
}

/// Quality thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Minimum return on equity (%)
    #[serde(default = "default_min_roe")]
    pub min_roe: f64,

    /// Minimum return on capital employed (%)
    #[serde(default = "default_min_roce")]
    pub min_roce: f64,

    /// Maximum debt-to-equity ratio
    #[serde(default = "default_max_debt_to_equity")]
    pub max_debt_to_equity: f64,

    /// Minimum interest coverage (EBIT / interest expense)
    #[serde(default = "default_min_interest_coverage")]
    pub min_interest_coverage: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_roe: default_min_roe(),
            min_roce: default_min_roce(),
            max_debt_to_equity: default_max_debt_to_equity(),
            min_interest_coverage: default_min_interest_coverage(),
        }
    }
}

fn default_min_roe() -> f64 {
    12.0
}

fn default_min_roce() -> f64 {
    15.0
}

fn default_max_debt_to_equity() -> f64 {
    0.8
}

fn default_min_interest_coverage() -> f64 {
    3.0
}

/// Promoter-activity thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoterConfig {
    /// Minimum quarter-over-quarter change in promoter holding, in
    /// percentage points (positive = promoters accumulating)
    #[serde(default = "default_min_promoter_change")]
    pub min_change_qoq_pct_pts: f64,
}

impl Default for PromoterConfig {
    fn default() -> Self {
        Self {
            min_change_qoq_pct_pts: default_min_promoter_change(),
        }
    }
}

fn default_min_promoter_change() -> f64 {
    0.1
}

/// Technical-trend thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalConfig {
    /// Require last close above the 200-day SMA
    #[serde(default = "default_true")]
    pub require_price_above_200d: bool,

    /// Require the 50-day SMA above the 200-day SMA
    #[serde(default = "default_true")]
    pub require_sma50_above_200d: bool,

    /// Maximum distance below the 52-week high (%)
    #[serde(default = "default_max_pct_below_52w_high")]
    pub max_pct_below_52w_high: f64,

    /// RSI(14) band: lower bound
    #[serde(default = "default_rsi_min")]
    pub rsi_min: f64,

    /// RSI(14) band: upper bound
    #[serde(default = "default_rsi_max")]
    pub rsi_max: f64,

    /// Minimum last-day volume as a multiple of the 50-day average
    #[serde(default = "default_min_volume_mult")]
    pub min_volume_mult_vs_50d: f64,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            require_price_above_200d: true,
            require_sma50_above_200d: true,
            max_pct_below_52w_high: default_max_pct_below_52w_high(),
            rsi_min: default_rsi_min(),
            rsi_max: default_rsi_max(),
            min_volume_mult_vs_50d: default_min_volume_mult(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_pct_below_52w_high() -> f64 {
    10.0
}

fn default_rsi_min() -> f64 {
    45.0
}

fn default_rsi_max() -> f64 {
    70.0
}

fn default_min_volume_mult() -> f64 {
    1.3
}

// ============================================================================
// Run Configuration
// ============================================================================

/// Run-level knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Trading days of price history to fetch (420 covers the 200DMA and
    /// the 52-week window with margin)
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// HTTP timeout in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Minimum pause between outbound requests, in milliseconds
    #[serde(default = "default_download_pause_ms")]
    pub download_pause_ms: u64,

    /// Retry attempts for the promoter-activity endpoint before degrading
    #[serde(default = "default_promoter_retries")]
    pub promoter_retries: u32,

    /// Cap on symbols carried into the fundamentals/promoter phase after
    /// the technical prefilter (None = no cap)
    #[serde(default = "default_fundamentals_max_symbols")]
    pub fundamentals_max_symbols: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            http_timeout_secs: default_http_timeout_secs(),
            download_pause_ms: default_download_pause_ms(),
            promoter_retries: default_promoter_retries(),
            fundamentals_max_symbols: default_fundamentals_max_symbols(),
        }
    }
}

fn default_lookback_days() -> u32 {
    420
}

fn default_http_timeout_secs() -> u64 {
    20
}

fn default_download_pause_ms() -> u64 {
    800
}

fn default_promoter_retries() -> u32 {
    3
}

fn default_fundamentals_max_symbols() -> Option<usize> {
    Some(150)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScreenerConfig::default();
        assert_eq!(config.universe.index, NiftyIndex::Nifty500);
        assert!(config.universe.limit.is_none());
        assert!((config.valuation.min_pe - 5.0).abs() < f64::EPSILON);
        assert!((config.valuation.max_pe - 35.0).abs() < f64::EPSILON);
        assert!((config.quality.max_debt_to_equity - 0.8).abs() < f64::EPSILON);
        assert!(config.technical.require_price_above_200d);
        assert_eq!(config.run.lookback_days, 420);
        assert_eq!(config.run.fundamentals_max_symbols, Some(150));
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = ScreenerConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("valuation"));
        assert!(json.contains("min_change_qoq_pct_pts"));

        let parsed: ScreenerConfig = serde_json::from_str(&json).unwrap();
        assert!((parsed.valuation.max_pb - config.valuation.max_pb).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_overlay_keeps_defaults() {
        let json = r#"{"valuation": {"max_pe": 25.0}, "universe": {"index": "NIFTY50"}}"#;
        let config: ScreenerConfig = serde_json::from_str(json).unwrap();
        assert!((config.valuation.max_pe - 25.0).abs() < f64::EPSILON);
        // Untouched fields keep their defaults
        assert!((config.valuation.min_pe - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.universe.index, NiftyIndex::Nifty50);
        assert!((config.quality.min_roe - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_without_path_gives_defaults() {
        let config = ScreenerConfig::load(None).unwrap();
        assert!((config.technical.rsi_min - 45.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_mentions_thresholds() {
        let summary = ScreenerConfig::default().summary();
        assert!(summary.contains("PE 5-35"));
        assert!(summary.contains("ROE>12%"));
    }
}
