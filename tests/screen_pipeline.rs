//! End-to-end pipeline tests against in-memory data sources.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use nifty_screener::config::ScreenerConfig;
use nifty_screener::data::{
    FetchError, FundamentalSnapshot, PriceBar, PromoterOutcome, PromoterSnapshot, PromoterSource,
    QuoteProvider,
};
use nifty_screener::screen::{ReportWriter, ScreenEngine, ScreenSide, Verdict};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeProvider {
    histories: HashMap<String, Vec<PriceBar>>,
    fundamentals: HashMap<String, FundamentalSnapshot>,
    /// Tickers whose history fetch fails with a network error
    broken: Vec<String>,
}

#[async_trait]
impl QuoteProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_history(
        &self,
        ticker: &str,
        _lookback_days: u32,
    ) -> Result<Vec<PriceBar>, FetchError> {
        if self.broken.iter().any(|t| t == ticker) {
            return Err(FetchError::Network("connection reset".to_string()));
        }
        self.histories
            .get(ticker)
            .cloned()
            .ok_or_else(|| FetchError::DataNotAvailable(ticker.to_string()))
    }

    async fn fetch_fundamentals(&self, ticker: &str) -> Result<FundamentalSnapshot, FetchError> {
        self.fundamentals
            .get(ticker)
            .cloned()
            .ok_or_else(|| FetchError::DataNotAvailable(ticker.to_string()))
    }
}

#[derive(Default)]
struct FakePromoterSource {
    snapshots: HashMap<String, PromoterSnapshot>,
}

#[async_trait]
impl PromoterSource for FakePromoterSource {
    async fn fetch(&self, nse_symbol: &str) -> PromoterOutcome {
        match self.snapshots.get(nse_symbol) {
            Some(snap) => PromoterOutcome::Available(*snap),
            None => PromoterOutcome::Unavailable,
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Sawtooth uptrend (+2/-1 alternating) with a volume spike on the last
/// bar: RSI lands mid-band, price sits above both moving averages near
/// the 52-week high, and the last day trades well above average volume.
fn uptrend_bars(days: usize) -> Vec<PriceBar> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut close = 100.0;
    (0..days)
        .map(|i| {
            close += if i % 2 == 0 { 2.0 } else { -1.0 };
            PriceBar {
                date: start + chrono::Days::new(i as u64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: if i == days - 1 { 2000.0 } else { 1000.0 },
            }
        })
        .collect()
}

fn strong_fundamentals() -> FundamentalSnapshot {
    FundamentalSnapshot {
        market_cap: Some(2.0e12),
        pe: Some(22.0),
        pb: Some(3.5),
        ev_ebitda: Some(14.0),
        roe: Some(18.0),
        roce: Some(21.0),
        debt_to_equity: Some(0.4),
        interest_coverage: Some(7.0),
        revenue_cagr_3y: Some(13.0),
        eps_cagr_3y: Some(12.0),
    }
}

fn rising_promoter() -> PromoterSnapshot {
    PromoterSnapshot {
        latest_percent: 55.2,
        prev_percent: Some(54.8),
        change_qoq_pct_pts: Some(0.4),
    }
}

fn engine_with(
    provider: FakeProvider,
    promoter: FakePromoterSource,
) -> ScreenEngine<FakeProvider, FakePromoterSource> {
    ScreenEngine::new(
        ScreenerConfig::default(),
        Arc::new(provider),
        Arc::new(promoter),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn promoter_unavailability_degrades_without_failing() {
    let mut provider = FakeProvider::default();
    provider
        .histories
        .insert("AAA.NS".to_string(), uptrend_bars(300));
    provider
        .histories
        .insert("BBB.NS".to_string(), uptrend_bars(300));
    provider
        .fundamentals
        .insert("AAA.NS".to_string(), strong_fundamentals());
    provider
        .fundamentals
        .insert("BBB.NS".to_string(), strong_fundamentals());

    // Promoter data exists only for AAA
    let mut promoter = FakePromoterSource::default();
    promoter.snapshots.insert("AAA".to_string(), rising_promoter());

    let engine = engine_with(provider, promoter);
    let universe = vec!["AAA.NS".to_string(), "BBB.NS".to_string()];
    let run = engine.run(&universe, ScreenSide::Buy).await.unwrap();

    assert_eq!(run.results.len(), 2);
    assert!(run.excluded.is_empty());

    let aaa = run.results.iter().find(|r| r.ticker == "AAA.NS").unwrap();
    let bbb = run.results.iter().find(|r| r.ticker == "BBB.NS").unwrap();

    assert_eq!(aaa.verdicts.promoter, Verdict::Pass);
    assert!(aaa.promoter.is_some());

    // Missing promoter data is not a failure and does not block the
    // recommendation
    assert_eq!(bbb.verdicts.promoter, Verdict::NotEvaluated);
    assert!(bbb.promoter.is_none());
    assert!(bbb.recommended);

    // The promoter point shows up in the score gap
    assert!(aaa.score > bbb.score);
}

#[tokio::test]
async fn history_failure_excludes_only_that_ticker() {
    let mut provider = FakeProvider::default();
    provider
        .histories
        .insert("AAA.NS".to_string(), uptrend_bars(300));
    provider
        .fundamentals
        .insert("AAA.NS".to_string(), strong_fundamentals());
    provider.broken.push("DOWN.NS".to_string());

    let engine = engine_with(provider, FakePromoterSource::default());
    let universe = vec!["AAA.NS".to_string(), "DOWN.NS".to_string()];
    let run = engine.run(&universe, ScreenSide::Buy).await.unwrap();

    assert_eq!(run.universe_size, 2);
    assert_eq!(run.results.len(), 1);
    assert_eq!(run.results[0].ticker, "AAA.NS");
    assert_eq!(run.excluded, vec!["DOWN.NS".to_string()]);
}

#[tokio::test]
async fn fundamentals_failure_degrades_to_not_evaluated() {
    let mut provider = FakeProvider::default();
    provider
        .histories
        .insert("AAA.NS".to_string(), uptrend_bars(300));
    // No fundamentals entry: the fetch errors with DataNotAvailable

    let engine = engine_with(provider, FakePromoterSource::default());
    let run = engine
        .run(&["AAA.NS".to_string()], ScreenSide::Buy)
        .await
        .unwrap();

    assert_eq!(run.results.len(), 1);
    let r = &run.results[0];
    assert_eq!(r.verdicts.valuation, Verdict::NotEvaluated);
    assert_eq!(r.verdicts.growth, Verdict::NotEvaluated);
    assert_eq!(r.verdicts.quality, Verdict::NotEvaluated);
    // Technicals still evaluate from the fetched history
    assert_ne!(r.verdicts.technical, Verdict::NotEvaluated);
}

#[tokio::test]
async fn one_row_per_fetched_ticker_and_deterministic_order() {
    let mut provider = FakeProvider::default();
    for ticker in ["AAA.NS", "BBB.NS", "CCC.NS"] {
        provider
            .histories
            .insert(ticker.to_string(), uptrend_bars(300));
        provider
            .fundamentals
            .insert(ticker.to_string(), strong_fundamentals());
    }
    // Give CCC a larger market cap so the tie-break is exercised
    if let Some(f) = provider.fundamentals.get_mut("CCC.NS") {
        f.market_cap = Some(5.0e12);
    }

    let engine = engine_with(provider, FakePromoterSource::default());
    let universe = vec![
        "AAA.NS".to_string(),
        "BBB.NS".to_string(),
        "CCC.NS".to_string(),
    ];

    let first = engine.run(&universe, ScreenSide::Buy).await.unwrap();
    let second = engine.run(&universe, ScreenSide::Buy).await.unwrap();

    let tickers: Vec<&str> = first.results.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(tickers.len(), 3);
    // Equal scores: market cap breaks the tie, then ticker
    assert_eq!(tickers, vec!["CCC.NS", "AAA.NS", "BBB.NS"]);

    let again: Vec<&str> = second.results.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(tickers, again);
    for (a, b) in first.results.iter().zip(second.results.iter()) {
        assert_eq!(a.score, b.score);
        assert_eq!(a.verdicts, b.verdicts);
    }
}

#[tokio::test]
async fn prefiltered_ticker_still_gets_a_row() {
    let mut provider = FakeProvider::default();
    provider
        .histories
        .insert("UP.NS".to_string(), uptrend_bars(300));
    provider
        .fundamentals
        .insert("UP.NS".to_string(), strong_fundamentals());

    // Downtrend fails the buy-side prefilter, so no fundamentals are
    // fetched, but the ticker still appears in the output
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let downtrend: Vec<PriceBar> = (0..300)
        .map(|i| {
            let close = 400.0 - i as f64 * 0.5;
            PriceBar {
                date: start + chrono::Days::new(i as u64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect();
    provider.histories.insert("DOWN.NS".to_string(), downtrend);

    let engine = engine_with(provider, FakePromoterSource::default());
    let universe = vec!["UP.NS".to_string(), "DOWN.NS".to_string()];
    let run = engine.run(&universe, ScreenSide::Buy).await.unwrap();

    assert_eq!(run.results.len(), 2);
    let down = run.results.iter().find(|r| r.ticker == "DOWN.NS").unwrap();
    assert_eq!(down.verdicts.technical, Verdict::Fail);
    assert_eq!(down.verdicts.valuation, Verdict::NotEvaluated);
    assert!(!down.recommended);
}

#[tokio::test]
async fn report_has_one_row_per_result() {
    let mut provider = FakeProvider::default();
    for ticker in ["AAA.NS", "BBB.NS"] {
        provider
            .histories
            .insert(ticker.to_string(), uptrend_bars(300));
        provider
            .fundamentals
            .insert(ticker.to_string(), strong_fundamentals());
    }

    let engine = engine_with(provider, FakePromoterSource::default());
    let universe = vec!["AAA.NS".to_string(), "BBB.NS".to_string()];
    let run = engine.run(&universe, ScreenSide::Buy).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");
    ReportWriter::new().write_to_path(&run, &path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1 + run.results.len());
    assert!(lines.iter().skip(1).any(|l| l.starts_with("AAA.NS,")));
    assert!(lines.iter().skip(1).any(|l| l.starts_with("BBB.NS,")));
}
