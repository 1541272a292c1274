//! Screening engine.
//!
//! Orchestrates one run: price history per ticker, technical prefilter,
//! fundamentals and promoter enrichment, dimension evaluation, ranking.
//!
//! Failure policy (the only part of this pipeline with teeth):
//! - history fetch failure excludes the ticker and continues the batch,
//! - fundamentals fetch failure degrades those dimensions to NotEvaluated,
//! - promoter unavailability is an expected state, never an error.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ScreenerConfig, TechnicalConfig};
use crate::data::{
    FundamentalSnapshot, PromoterSnapshot, PromoterSource, QuoteProvider, QuoteRecord,
};
use crate::technical::TechnicalSnapshot;
use crate::universe::to_nse_root;

use super::rules::{self, DimensionVerdicts};

// ============================================================================
// Screening Result
// ============================================================================

/// Which screen to run. The sell side is accepted but currently runs the
/// same rule set with the technical prefilter disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenSide {
    Buy,
    Sell,
}

/// Per-ticker verdict for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub ticker: String,
    pub verdicts: DimensionVerdicts,
    pub score: f64,
    /// Every evaluated dimension passed
    pub recommended: bool,
    pub fundamentals: FundamentalSnapshot,
    pub technicals: TechnicalSnapshot,
    pub promoter: Option<PromoterSnapshot>,
    pub screened_at: DateTime<Utc>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenRun {
    /// Results sorted by score desc, then market cap desc, then ticker
    pub results: Vec<ScreeningResult>,
    /// Universe size before any fetching
    pub universe_size: usize,
    /// Tickers excluded because their history fetch failed
    pub excluded: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl ScreenRun {
    /// Summary string for logging.
    pub fn summary(&self) -> String {
        let recommended = self.results.iter().filter(|r| r.recommended).count();
        format!(
            "Screened {} of {} tickers in {:.1}s: {} recommended, {} excluded",
            self.results.len(),
            self.universe_size,
            self.duration_secs,
            recommended,
            self.excluded.len()
        )
    }
}

// ============================================================================
// Screen Engine
// ============================================================================

/// The screening engine, generic over its two data seams so tests can
/// drive it with in-memory fakes.
pub struct ScreenEngine<P: QuoteProvider, S: PromoterSource> {
    config: ScreenerConfig,
    provider: Arc<P>,
    promoter: Arc<S>,
}

impl<P: QuoteProvider, S: PromoterSource> ScreenEngine<P, S> {
    pub fn new(config: ScreenerConfig, provider: Arc<P>, promoter: Arc<S>) -> Self {
        Self {
            config,
            provider,
            promoter,
        }
    }

    /// Run the screen over a universe of Yahoo-style tickers.
    ///
    /// Every ticker whose history fetch succeeds produces exactly one
    /// result row; the ordering and scores are deterministic for fixed
    /// fetched inputs and configuration.
    pub async fn run(&self, universe: &[String], side: ScreenSide) -> Result<ScreenRun> {
        let started_at = Utc::now();
        info!(
            tickers = universe.len(),
            side = ?side,
            provider = self.provider.name(),
            config = %self.config.summary(),
            "Starting screen"
        );

        // Phase 1: price history and technicals
        let (records, excluded) = self.fetch_histories(universe).await;
        info!(
            fetched = records.len(),
            excluded = excluded.len(),
            "Phase 1 (price history) complete"
        );

        // Phase 2: decide which tickers earn the expensive fundamentals
        // and promoter lookups
        let enriched = self.select_for_enrichment(&records, side);
        info!(selected = enriched.len(), "Phase 2 (prefilter) complete");

        // Phase 3: enrich and evaluate
        let mut results = Vec::with_capacity(records.len());
        for (record, technicals) in &records {
            let enrich = enriched.contains(&record.ticker.as_str());
            let (fundamentals, promoter) = if enrich {
                self.enrich(&record.ticker).await
            } else {
                (FundamentalSnapshot::default(), None)
            };

            let verdicts = rules::evaluate_all(
                &fundamentals,
                technicals,
                promoter.as_ref(),
                &self.config,
            );
            let score = rules::score(&fundamentals, technicals, promoter.as_ref(), &self.config);

            results.push(ScreeningResult {
                ticker: record.ticker.clone(),
                recommended: verdicts.recommended(),
                verdicts,
                score,
                fundamentals,
                technicals: technicals.clone(),
                promoter,
                screened_at: Utc::now(),
            });
        }

        // Phase 4: rank. Stable keys keep the output deterministic.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let mc_a = a.fundamentals.market_cap.unwrap_or(0.0);
                    let mc_b = b.fundamentals.market_cap.unwrap_or(0.0);
                    mc_b.partial_cmp(&mc_a).unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.ticker.cmp(&b.ticker))
        });

        let completed_at = Utc::now();
        let duration_secs = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let run = ScreenRun {
            results,
            universe_size: universe.len(),
            excluded,
            started_at,
            completed_at,
            duration_secs,
        };

        info!("{}", run.summary());
        Ok(run)
    }

    // ========================================================================
    // Internal Phases
    // ========================================================================

    async fn fetch_histories(
        &self,
        universe: &[String],
    ) -> (Vec<(QuoteRecord, TechnicalSnapshot)>, Vec<String>) {
        let mut records = Vec::with_capacity(universe.len());
        let mut excluded = Vec::new();

        for ticker in universe {
            match self
                .provider
                .fetch_history(ticker, self.config.run.lookback_days)
                .await
            {
                Ok(bars) => {
                    let technicals = TechnicalSnapshot::compute(&bars);
                    records.push((
                        QuoteRecord {
                            ticker: ticker.clone(),
                            bars,
                            fundamentals: FundamentalSnapshot::default(),
                        },
                        technicals,
                    ));
                }
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "History fetch failed, excluding ticker");
                    excluded.push(ticker.clone());
                }
            }
        }

        (records, excluded)
    }

    /// Pick the tickers that proceed to fundamentals/promoter fetching:
    /// buy-side runs prefilter on technicals first (missing values pass),
    /// then the configured cap applies in ranking-neutral universe order.
    fn select_for_enrichment<'a>(
        &self,
        records: &'a [(QuoteRecord, TechnicalSnapshot)],
        side: ScreenSide,
    ) -> Vec<&'a str> {
        let mut selected: Vec<&str> = records
            .iter()
            .filter(|(_, tech)| {
                side != ScreenSide::Buy || passes_prefilter(tech, &self.config.technical)
            })
            .map(|(rec, _)| rec.ticker.as_str())
            .collect();

        if let Some(max) = self.config.run.fundamentals_max_symbols {
            selected.truncate(max);
        }
        selected
    }

    async fn enrich(&self, ticker: &str) -> (FundamentalSnapshot, Option<PromoterSnapshot>) {
        let fundamentals = match self.provider.fetch_fundamentals(ticker).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Degrade, don't exclude: the technical row still stands.
                warn!(ticker, error = %e, "Fundamentals fetch failed, degrading");
                FundamentalSnapshot::default()
            }
        };

        let outcome = self.promoter.fetch(to_nse_root(ticker)).await;
        if !outcome.is_available() {
            debug!(ticker, "Promoter data unavailable, dimension not evaluated");
        }

        (fundamentals, outcome.snapshot().copied())
    }
}

/// Buy-side technical prefilter. Criteria with missing inputs pass, so a
/// thin history never silently drops a ticker before evaluation.
fn passes_prefilter(tech: &TechnicalSnapshot, cfg: &TechnicalConfig) -> bool {
    if cfg.require_price_above_200d && tech.price_above_200d == Some(false) {
        return false;
    }
    if cfg.require_sma50_above_200d && tech.sma50_above_200d == Some(false) {
        return false;
    }
    if tech
        .pct_below_52w_high
        .is_some_and(|v| v > cfg.max_pct_below_52w_high)
    {
        return false;
    }
    if tech
        .rsi14
        .is_some_and(|v| v < cfg.rsi_min || v > cfg.rsi_max)
    {
        return false;
    }
    if tech
        .volume_mult_vs_50d
        .is_some_and(|v| v < cfg.min_volume_mult_vs_50d)
    {
        return false;
    }
    true
}

// ============================================================================
// Tests
// ============================================================================
