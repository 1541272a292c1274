//! CSV report writer for screening runs.

use std::path::Path;

use anyhow::{Context, Result};

use super::engine::{ScreenRun, ScreeningResult};

// ============================================================================
// Columns
// ============================================================================

/// A report column: a header plus a value extractor. Keeping these in one
/// enum keeps header and row rendering in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Ticker,
    Score,
    Recommended,
    ValuationVerdict,
    GrowthVerdict,
    QualityVerdict,
    PromoterVerdict,
    TechnicalVerdict,
    MarketCap,
    Pe,
    Pb,
    EvEbitda,
    RevenueCagr3y,
    EpsCagr3y,
    Roe,
    Roce,
    DebtToEquity,
    InterestCoverage,
    PromoterLatestPct,
    PromoterChangeQoq,
    Close,
    Rsi14,
    PctBelow52wHigh,
    VolumeMultVs50d,
}

impl Column {
    pub fn header(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Score => "score",
            Self::Recommended => "recommended",
            Self::ValuationVerdict => "valuation",
            Self::GrowthVerdict => "growth",
            Self::QualityVerdict => "quality",
            Self::PromoterVerdict => "promoter",
            Self::TechnicalVerdict => "technical",
            Self::MarketCap => "market_cap",
            Self::Pe => "pe",
            Self::Pb => "pb",
            Self::EvEbitda => "ev_ebitda",
            Self::RevenueCagr3y => "revenue_cagr_3y_pct",
            Self::EpsCagr3y => "eps_cagr_3y_pct",
            Self::Roe => "roe_pct",
            Self::Roce => "roce_pct",
            Self::DebtToEquity => "debt_to_equity",
            Self::InterestCoverage => "interest_coverage",
            Self::PromoterLatestPct => "promoter_holding_pct",
            Self::PromoterChangeQoq => "promoter_change_qoq_pct_pts",
            Self::Close => "close",
            Self::Rsi14 => "rsi14",
            Self::PctBelow52wHigh => "pct_below_52w_high",
            Self::VolumeMultVs50d => "volume_mult_vs_50d",
        }
    }

    /// Render this column for one result. Missing numerics render as an
    /// empty cell, never as NaN or a sentinel.
    pub fn value(&self, r: &ScreeningResult) -> String {
        match self {
            Self::Ticker => r.ticker.clone(),
            Self::Score => format!("{:.1}", r.score),
            Self::Recommended => (if r.recommended { "yes" } else { "no" }).to_string(),
            Self::ValuationVerdict => r.verdicts.valuation.to_string(),
            Self::GrowthVerdict => r.verdicts.growth.to_string(),
            Self::QualityVerdict => r.verdicts.quality.to_string(),
            Self::PromoterVerdict => r.verdicts.promoter.to_string(),
            Self::TechnicalVerdict => r.verdicts.technical.to_string(),
            Self::MarketCap => number(r.fundamentals.market_cap, 0),
            Self::Pe => number(r.fundamentals.pe, 2),
            Self::Pb => number(r.fundamentals.pb, 2),
            Self::EvEbitda => number(r.fundamentals.ev_ebitda, 2),
            Self::RevenueCagr3y => number(r.fundamentals.revenue_cagr_3y, 2),
            Self::EpsCagr3y => number(r.fundamentals.eps_cagr_3y, 2),
            Self::Roe => number(r.fundamentals.roe, 2),
            Self::Roce => number(r.fundamentals.roce, 2),
            Self::DebtToEquity => number(r.fundamentals.debt_to_equity, 2),
            Self::InterestCoverage => number(r.fundamentals.interest_coverage, 2),
            Self::PromoterLatestPct => {
                number(r.promoter.as_ref().map(|p| p.latest_percent), 2)
            }
            Self::PromoterChangeQoq => {
                number(r.promoter.as_ref().and_then(|p| p.change_qoq_pct_pts), 2)
            }
            Self::Close => number(r.technicals.close, 2),
            Self::Rsi14 => number(r.technicals.rsi14, 1),
            Self::PctBelow52wHigh => number(r.technicals.pct_below_52w_high, 1),
            Self::VolumeMultVs50d => number(r.technicals.volume_mult_vs_50d, 2),
        }
    }
}

fn number(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.decimals$}"),
        _ => String::new(),
    }
}

// ============================================================================
// Report Writer
// ============================================================================

/// Writes a [`ScreenRun`] as CSV, one row per screened ticker in ranked
/// order. An empty run still produces a header-only file.
pub struct ReportWriter {
    columns: Vec<Column>,
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self {
            columns: vec![
                Column::Ticker,
                Column::Score,
                Column::Recommended,
                Column::ValuationVerdict,
                Column::GrowthVerdict,
                Column::QualityVerdict,
                Column::PromoterVerdict,
                Column::TechnicalVerdict,
                Column::MarketCap,
                Column::Pe,
                Column::Pb,
                Column::EvEbitda,
                Column::RevenueCagr3y,
                Column::EpsCagr3y,
                Column::Roe,
                Column::Roce,
                Column::DebtToEquity,
                Column::InterestCoverage,
                Column::PromoterLatestPct,
                Column::PromoterChangeQoq,
                Column::Close,
                Column::Rsi14,
                Column::PctBelow52wHigh,
                Column::VolumeMultVs50d,
            ],
        }
    }
}

impl ReportWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Write the run to a CSV file, creating parent directories as needed.
    pub fn write_to_path(&self, run: &ScreenRun, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
        }

        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create report file {}", path.display()))?;
        self.write_rows(run, &mut writer)?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush report to {}", path.display()))?;
        Ok(())
    }

    /// Render the run as an in-memory CSV string.
    pub fn to_csv_string(&self, run: &ScreenRun) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        self.write_rows(run, &mut writer)?;
        let bytes = writer.into_inner().context("Failed to finish CSV buffer")?;
        String::from_utf8(bytes).context("Report CSV was not valid UTF-8")
    }

    fn write_rows<W: std::io::Write>(&self, run: &ScreenRun, writer: &mut csv::Writer<W>) -> Result<()> {
        writer
            .write_record(self.columns.iter().map(|c| c.header()))
            .context("Failed to write report header")?;

        for result in &run.results {
            writer
                .write_record(self.columns.iter().map(|c| c.value(result)))
                .with_context(|| format!("Failed to write report row for {}", result.ticker))?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FundamentalSnapshot, PromoterSnapshot};
    use crate::screen::rules::{DimensionVerdicts, Verdict};
    use crate::technical::TechnicalSnapshot;
    use chrono::Utc;

    fn sample_result(ticker: &str, score: f64) -> ScreeningResult {
        ScreeningResult {
            ticker: ticker.to_string(),
            verdicts: DimensionVerdicts {
                valuation: Verdict::Pass,
                growth: Verdict::Pass,
                quality: Verdict::Pass,
                promoter: Verdict::NotEvaluated,
                technical: Verdict::Pass,
            },
            score,
            recommended: true,
            fundamentals: FundamentalSnapshot {
                market_cap: Some(1.5e12),
                pe: Some(22.5),
                ..Default::default()
            },
            technicals: TechnicalSnapshot {
                close: Some(1234.5),
                rsi14: Some(58.3),
                ..Default::default()
            },
            promoter: None,
            screened_at: Utc::now(),
        }
    }

    fn sample_run(results: Vec<ScreeningResult>) -> ScreenRun {
        let now = Utc::now();
        ScreenRun {
            universe_size: results.len(),
            results,
            excluded: Vec::new(),
            started_at: now,
            completed_at: now,
            duration_secs: 0.0,
        }
    }

    #[test]
    fn test_csv_string_one_row_per_result() {
        let run = sample_run(vec![sample_result("INFY.NS", 7.5), sample_result("TCS.NS", 6.0)]);
        let out = ReportWriter::new().to_csv_string(&run).unwrap();

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ticker,score,recommended"));
        assert!(lines[1].starts_with("INFY.NS,7.5,yes,PASS,PASS,PASS,NA,PASS"));
        assert!(lines[2].starts_with("TCS.NS,6.0,yes"));
    }

    #[test]
    fn test_missing_values_render_empty() {
        let run = sample_run(vec![sample_result("INFY.NS", 7.5)]);
        let out = ReportWriter::with_columns(vec![Column::Ticker, Column::Pb, Column::PromoterLatestPct])
            .to_csv_string(&run)
            .unwrap();
        assert_eq!(out.lines().nth(1), Some("INFY.NS,,"));
    }

    #[test]
    fn test_promoter_columns_populated_when_available() {
        let mut result = sample_result("INFY.NS", 8.0);
        result.promoter = Some(PromoterSnapshot {
            latest_percent: 54.32,
            prev_percent: Some(54.02),
            change_qoq_pct_pts: Some(0.3),
        });
        let run = sample_run(vec![result]);
        let out = ReportWriter::with_columns(vec![
            Column::Ticker,
            Column::PromoterLatestPct,
            Column::PromoterChangeQoq,
        ])
        .to_csv_string(&run)
        .unwrap();
        assert_eq!(out.lines().nth(1), Some("INFY.NS,54.32,0.30"));
    }

    #[test]
    fn test_empty_run_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("out.csv");

        let run = sample_run(Vec::new());
        ReportWriter::new().write_to_path(&run, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.starts_with("ticker,"));
    }

    #[test]
    fn test_write_to_path_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let run = sample_run(vec![sample_result("HDFCBANK.NS", 9.0)]);
        ReportWriter::new().write_to_path(&run, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("HDFCBANK.NS"));
    }
}
