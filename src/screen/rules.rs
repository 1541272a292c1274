//! Threshold rules per screening dimension.
//!
//! Each dimension is evaluated independently. A criterion whose input is
//! missing is skipped; a dimension where every criterion was skipped is
//! `NotEvaluated` and excluded from the aggregate recommendation — absence
//! of data is never counted as a failure.

use serde::{Deserialize, Serialize};

use crate::config::{
    GrowthConfig, PromoterConfig, QualityConfig, ScreenerConfig, TechnicalConfig, ValuationConfig,
};
use crate::data::{FundamentalSnapshot, PromoterSnapshot};
use crate::technical::TechnicalSnapshot;

// ============================================================================
// Verdicts
// ============================================================================

/// Outcome of one dimension for one ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Fail,
    /// Required input absent; excluded from the aggregate
    NotEvaluated,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::NotEvaluated => write!(f, "NA"),
        }
    }
}

/// The five screening dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    Valuation,
    Growth,
    Quality,
    Promoter,
    Technical,
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valuation => write!(f, "valuation"),
            Self::Growth => write!(f, "growth"),
            Self::Quality => write!(f, "quality"),
            Self::Promoter => write!(f, "promoter"),
            Self::Technical => write!(f, "technical"),
        }
    }
}

/// Per-dimension verdicts for one ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionVerdicts {
    pub valuation: Verdict,
    pub growth: Verdict,
    pub quality: Verdict,
    pub promoter: Verdict,
    pub technical: Verdict,
}

impl DimensionVerdicts {
    /// Aggregate recommendation: every evaluated dimension passed, and at
    /// least one dimension was actually evaluated.
    pub fn recommended(&self) -> bool {
        let verdicts = self.all();
        verdicts.iter().any(|(_, v)| *v == Verdict::Pass)
            && !verdicts.iter().any(|(_, v)| *v == Verdict::Fail)
    }

    /// All verdicts, paired with their dimension.
    pub fn all(&self) -> [(Dimension, Verdict); 5] {
        [
            (Dimension::Valuation, self.valuation),
            (Dimension::Growth, self.growth),
            (Dimension::Quality, self.quality),
            (Dimension::Promoter, self.promoter),
            (Dimension::Technical, self.technical),
        ]
    }
}

// ============================================================================
// Criterion Accumulator
// ============================================================================

/// Tracks how many criteria in a dimension were evaluated and failed.
#[derive(Debug, Default)]
struct Checks {
    evaluated: u32,
    failed: u32,
}

impl Checks {
    /// Evaluate one criterion; a None input skips it.
    fn check(&mut self, value: Option<f64>, pass: impl FnOnce(f64) -> bool) {
        if let Some(v) = value {
            self.evaluated += 1;
            if !pass(v) {
                self.failed += 1;
            }
        }
    }

    fn check_flag(&mut self, value: Option<bool>, required: bool) {
        if !required {
            return;
        }
        if let Some(v) = value {
            self.evaluated += 1;
            if !v {
                self.failed += 1;
            }
        }
    }

    fn verdict(self) -> Verdict {
        if self.evaluated == 0 {
            Verdict::NotEvaluated
        } else if self.failed > 0 {
            Verdict::Fail
        } else {
            Verdict::Pass
        }
    }
}

// ============================================================================
// Dimension Evaluation
// ============================================================================

pub fn evaluate_valuation(f: &FundamentalSnapshot, cfg: &ValuationConfig) -> Verdict {
    let mut checks = Checks::default();
    checks.check(f.pe, |pe| pe >= cfg.min_pe && pe <= cfg.max_pe);
    checks.check(f.pb, |pb| pb <= cfg.max_pb);
    if let Some(max) = cfg.max_ev_ebitda {
        checks.check(f.ev_ebitda, |ev| ev <= max);
    }
    checks.verdict()
}

pub fn evaluate_growth(f: &FundamentalSnapshot, cfg: &GrowthConfig) -> Verdict {
    let mut checks = Checks::default();
    checks.check(f.revenue_cagr_3y, |v| v >= cfg.min_revenue_cagr_3y);
    checks.check(f.eps_cagr_3y, |v| v >= cfg.min_eps_cagr_3y);
    checks.verdict()
}

pub fn evaluate_quality(f: &FundamentalSnapshot, cfg: &QualityConfig) -> Verdict {
    let mut checks = Checks::default();
    checks.check(f.roe, |v| v >= cfg.min_roe);
    checks.check(f.roce, |v| v >= cfg.min_roce);
    checks.check(f.debt_to_equity, |v| v <= cfg.max_debt_to_equity);
    checks.check(f.interest_coverage, |v| v >= cfg.min_interest_coverage);
    checks.verdict()
}

pub fn evaluate_promoter(p: Option<&PromoterSnapshot>, cfg: &PromoterConfig) -> Verdict {
    let mut checks = Checks::default();
    checks.check(p.and_then(|s| s.change_qoq_pct_pts), |v| {
        v >= cfg.min_change_qoq_pct_pts
    });
    checks.verdict()
}

pub fn evaluate_technical(t: &TechnicalSnapshot, cfg: &TechnicalConfig) -> Verdict {
    let mut checks = Checks::default();
    checks.check_flag(t.price_above_200d, cfg.require_price_above_200d);
    checks.check_flag(t.sma50_above_200d, cfg.require_sma50_above_200d);
    checks.check(t.pct_below_52w_high, |v| v <= cfg.max_pct_below_52w_high);
    checks.check(t.rsi14, |v| v >= cfg.rsi_min && v <= cfg.rsi_max);
    checks.check(t.volume_mult_vs_50d, |v| v >= cfg.min_volume_mult_vs_50d);
    checks.verdict()
}

/// Evaluate all five dimensions for one ticker.
pub fn evaluate_all(
    fundamentals: &FundamentalSnapshot,
    technicals: &TechnicalSnapshot,
    promoter: Option<&PromoterSnapshot>,
    cfg: &ScreenerConfig,
) -> DimensionVerdicts {
    DimensionVerdicts {
        valuation: evaluate_valuation(fundamentals, &cfg.valuation),
        growth: evaluate_growth(fundamentals, &cfg.growth),
        quality: evaluate_quality(fundamentals, &cfg.quality),
        promoter: evaluate_promoter(promoter, &cfg.promoter),
        technical: evaluate_technical(technicals, &cfg.technical),
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// Additive score: one point per passing criterion, half a point for the
/// softer RSI-band and volume-multiple signals. Missing inputs contribute
/// nothing, so the score is comparable across degraded tickers.
pub fn score(
    fundamentals: &FundamentalSnapshot,
    technicals: &TechnicalSnapshot,
    promoter: Option<&PromoterSnapshot>,
    cfg: &ScreenerConfig,
) -> f64 {
    fn point(value: Option<f64>, pass: impl FnOnce(f64) -> bool) -> f64 {
        if value.is_some_and(pass) {
            1.0
        } else {
            0.0
        }
    }

    let mut total = 0.0;

    // Valuation
    total += point(fundamentals.pe, |pe| {
        pe >= cfg.valuation.min_pe && pe <= cfg.valuation.max_pe
    });
    total += point(fundamentals.pb, |pb| pb <= cfg.valuation.max_pb);
    if let Some(max) = cfg.valuation.max_ev_ebitda {
        total += point(fundamentals.ev_ebitda, |ev| ev <= max);
    }

    // Growth
    total += point(fundamentals.revenue_cagr_3y, |v| {
        v >= cfg.growth.min_revenue_cagr_3y
    });
    total += point(fundamentals.eps_cagr_3y, |v| v >= cfg.growth.min_eps_cagr_3y);

    // Quality
    total += point(fundamentals.roe, |v| v >= cfg.quality.min_roe);
    total += point(fundamentals.roce, |v| v >= cfg.quality.min_roce);
    total += point(fundamentals.debt_to_equity, |v| {
        v <= cfg.quality.max_debt_to_equity
    });
    total += point(fundamentals.interest_coverage, |v| {
        v >= cfg.quality.min_interest_coverage
    });

    // Promoter
    total += point(promoter.and_then(|p| p.change_qoq_pct_pts), |v| {
        v >= cfg.promoter.min_change_qoq_pct_pts
    });

    // Technicals
    if technicals.price_above_200d == Some(true) {
        total += 1.0;
    }
    if technicals.sma50_above_200d == Some(true) {
        total += 1.0;
    }
    total += point(technicals.pct_below_52w_high, |v| {
        v <= cfg.technical.max_pct_below_52w_high
    });
    total += 0.5
        * point(technicals.rsi14, |v| {
            v >= cfg.technical.rsi_min && v <= cfg.technical.rsi_max
        });
    total += 0.5
        * point(technicals.volume_mult_vs_50d, |v| {
            v >= cfg.technical.min_volume_mult_vs_50d
        });

    total
}

// ============================================================================
// Tests
// ============================================================================
