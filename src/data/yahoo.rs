//! Yahoo Finance adapter.
//!
//! Fetches daily price history from the v8 chart endpoint and a fundamental
//! snapshot from the v10 quoteSummary endpoint. Both are free, keyless, and
//! patchy: any field the response omits simply stays `None` in the snapshot.
//!
//! Ratio conventions differ per module: `returnOnEquity` is a fraction,
//! `debtToEquity` is a percentage. Both are normalized here so the screening
//! rules see ROE in percent and D/E as a plain ratio.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tracing::debug;

use crate::config::RunConfig;
use crate::universe::BROWSER_USER_AGENT;

use super::provider::{FetchError, QuoteProvider};
use super::{cagr_percent, finite, FundamentalSnapshot, PriceBar, Throttle};

/// Chart (daily K-line) API
const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// quoteSummary (fundamentals) API
const QUOTE_SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";

/// quoteSummary modules needed for the fundamental snapshot
const QUOTE_SUMMARY_MODULES: &str =
    "summaryDetail,defaultKeyStatistics,financialData,incomeStatementHistory,balanceSheetHistory";

// ============================================================================
// Yahoo Provider
// ============================================================================

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::Client,
    throttle: Throttle,
}

impl YahooProvider {
    /// Create a provider with pacing and timeout from the run config.
    pub fn new(run: &RunConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(run.http_timeout_secs))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            throttle: Throttle::from_millis(run.download_pause_ms),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, FetchError> {
        self.throttle.wait().await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(FetchError::RateLimited { retry_after_secs });
        }
        if status.as_u16() == 404 {
            return Err(FetchError::DataNotAvailable(format!("HTTP 404 from {url}")));
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("HTTP {status} from {url}")));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }
}

#[async_trait]
impl QuoteProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_history(
        &self,
        ticker: &str,
        lookback_days: u32,
    ) -> Result<Vec<PriceBar>, FetchError> {
        let url = format!("{CHART_URL}/{ticker}?range={lookback_days}d&interval=1d");
        let envelope: ChartEnvelope = self.get_json(&url).await?;
        let bars = parse_chart(ticker, envelope)?;
        debug!(ticker, bars = bars.len(), "Fetched price history");
        Ok(bars)
    }

    async fn fetch_fundamentals(&self, ticker: &str) -> Result<FundamentalSnapshot, FetchError> {
        let url = format!("{QUOTE_SUMMARY_URL}/{ticker}?modules={QUOTE_SUMMARY_MODULES}");
        let envelope: QuoteSummaryEnvelope = self.get_json(&url).await?;

        let result = envelope
            .quote_summary
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| {
                FetchError::DataNotAvailable(format!("no quoteSummary result for {ticker}"))
            })?;

        Ok(snapshot_from_summary(&result))
    }
}

// ============================================================================
// Chart Parsing
// ============================================================================

fn parse_chart(ticker: &str, envelope: ChartEnvelope) -> Result<Vec<PriceBar>, FetchError> {
    let result = envelope
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .ok_or_else(|| FetchError::DataNotAvailable(format!("no chart data for {ticker}")))?;

    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Parse(format!("chart response for {ticker} has no quote block")))?;

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        // Rows with a null close are unpriced sessions; skip them.
        let (Some(open), Some(high), Some(low), Some(close)) = (
            value_at(&quote.open, i),
            value_at(&quote.high, i),
            value_at(&quote.low, i),
            value_at(&quote.close, i),
        ) else {
            continue;
        };

        let Some(date) = DateTime::from_timestamp(*ts, 0).map(|dt| dt.date_naive()) else {
            continue;
        };

        bars.push(PriceBar {
            date,
            open,
            high,
            low,
            close,
            volume: value_at(&quote.volume, i).unwrap_or(0.0),
        });
    }

    if bars.is_empty() {
        return Err(FetchError::DataNotAvailable(format!(
            "chart response for {ticker} contained no priced bars"
        )));
    }

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

fn value_at(series: &[Option<f64>], i: usize) -> Option<f64> {
    finite(series.get(i).copied().flatten())
}

// ============================================================================
// Fundamentals Assembly
// ============================================================================

fn snapshot_from_summary(result: &QuoteSummaryResult) -> FundamentalSnapshot {
    let detail = result.summary_detail.as_ref();
    let stats = result.key_stats.as_ref();
    let fin = result.financial_data.as_ref();
    let income: &[IncomeStatement] = result
        .income_history
        .as_ref()
        .map(|h| h.statements.as_slice())
        .unwrap_or_default();
    let balance: &[BalanceSheet] = result
        .balance_history
        .as_ref()
        .map(|h| h.statements.as_slice())
        .unwrap_or_default();

    // returnOnEquity is a fraction; statements-based fallback mirrors the
    // net-income-over-average-equity approximation.
    let roe = fin
        .and_then(|f| f.return_on_equity.value())
        .map(|v| v * 100.0)
        .or_else(|| roe_from_statements(income, balance));

    // debtToEquity arrives as a percentage (e.g. 80.0), screening thresholds
    // use the plain ratio.
    let debt_to_equity = fin
        .and_then(|f| f.debt_to_equity.value())
        .map(|v| v / 100.0);

    let shares_outstanding = stats.and_then(|s| s.shares_outstanding.value());

    FundamentalSnapshot {
        market_cap: detail.and_then(|d| d.market_cap.value()),
        pe: detail.and_then(|d| d.trailing_pe.value()),
        pb: stats.and_then(|s| s.price_to_book.value()),
        ev_ebitda: stats.and_then(|s| s.enterprise_to_ebitda.value()),
        roe,
        roce: roce_from_statements(income, balance),
        debt_to_equity,
        interest_coverage: interest_coverage_from_statements(income),
        revenue_cagr_3y: cagr_3y(income, |s| s.total_revenue.value()),
        eps_cagr_3y: eps_cagr_3y(income, shares_outstanding),
    }
}

/// Net income over average equity of the last two periods, in percent.
fn roe_from_statements(income: &[IncomeStatement], balance: &[BalanceSheet]) -> Option<f64> {
    let net_income = income.first()?.net_income.value()?;
    let eq_last = balance.first()?.total_stockholder_equity.value()?;
    let eq_prev = balance.get(1)?.total_stockholder_equity.value()?;
    let avg_equity = (eq_last + eq_prev) / 2.0;
    if avg_equity == 0.0 {
        return None;
    }
    Some(net_income / avg_equity * 100.0)
}

/// EBIT over capital employed (total assets minus current liabilities).
fn roce_from_statements(income: &[IncomeStatement], balance: &[BalanceSheet]) -> Option<f64> {
    let ebit = income.first()?.ebit.value()?;
    let bal = balance.first()?;
    let capital_employed = bal.total_assets.value()? - bal.total_current_liabilities.value()?;
    if capital_employed == 0.0 {
        return None;
    }
    Some(ebit / capital_employed * 100.0)
}

fn interest_coverage_from_statements(income: &[IncomeStatement]) -> Option<f64> {
    let latest = income.first()?;
    let ebit = latest.ebit.value()?;
    let interest = latest.interest_expense.value()?;
    if interest == 0.0 {
        return None;
    }
    // Interest expense is reported negative on Yahoo statements.
    Some(ebit / interest.abs())
}

/// 3-year CAGR over four annual statements (latest first).
fn cagr_3y(
    income: &[IncomeStatement],
    field: impl Fn(&IncomeStatement) -> Option<f64>,
) -> Option<f64> {
    if income.len() < 4 {
        return None;
    }
    let last = field(&income[0])?;
    let first = field(&income[3])?;
    cagr_percent(first, last, 3.0)
}

fn eps_cagr_3y(income: &[IncomeStatement], shares_outstanding: Option<f64>) -> Option<f64> {
    let shares = shares_outstanding.filter(|s| *s > 0.0)?;
    cagr_3y(income, |s| s.net_income.value().map(|ni| ni / shares))
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuoteBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    #[serde(default)]
    result: Option<Vec<QuoteSummaryResult>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSummaryResult {
    #[serde(rename = "summaryDetail", default)]
    summary_detail: Option<SummaryDetail>,
    #[serde(rename = "defaultKeyStatistics", default)]
    key_stats: Option<KeyStatistics>,
    #[serde(rename = "financialData", default)]
    financial_data: Option<FinancialData>,
    #[serde(rename = "incomeStatementHistory", default)]
    income_history: Option<IncomeStatementHistory>,
    #[serde(rename = "balanceSheetHistory", default)]
    balance_history: Option<BalanceSheetHistory>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryDetail {
    #[serde(rename = "trailingPE", default)]
    trailing_pe: RawValue,
    #[serde(rename = "marketCap", default)]
    market_cap: RawValue,
}

#[derive(Debug, Default, Deserialize)]
struct KeyStatistics {
    #[serde(rename = "priceToBook", default)]
    price_to_book: RawValue,
    #[serde(rename = "sharesOutstanding", default)]
    shares_outstanding: RawValue,
    #[serde(rename = "enterpriseToEbitda", default)]
    enterprise_to_ebitda: RawValue,
}

#[derive(Debug, Default, Deserialize)]
struct FinancialData {
    #[serde(rename = "returnOnEquity", default)]
    return_on_equity: RawValue,
    #[serde(rename = "debtToEquity", default)]
    debt_to_equity: RawValue,
}

#[derive(Debug, Default, Deserialize)]
struct IncomeStatementHistory {
    #[serde(rename = "incomeStatementHistory", default)]
    statements: Vec<IncomeStatement>,
}

/// One annual income statement; Yahoo orders these latest first.
#[derive(Debug, Default, Deserialize)]
struct IncomeStatement {
    #[serde(rename = "totalRevenue", default)]
    total_revenue: RawValue,
    #[serde(rename = "netIncome", default)]
    net_income: RawValue,
    #[serde(default)]
    ebit: RawValue,
    #[serde(rename = "interestExpense", default)]
    interest_expense: RawValue,
}

#[derive(Debug, Default, Deserialize)]
struct BalanceSheetHistory {
    #[serde(rename = "balanceSheetStatements", default)]
    statements: Vec<BalanceSheet>,
}

#[derive(Debug, Default, Deserialize)]
struct BalanceSheet {
    #[serde(rename = "totalAssets", default)]
    total_assets: RawValue,
    #[serde(rename = "totalCurrentLiabilities", default)]
    total_current_liabilities: RawValue,
    #[serde(rename = "totalStockholderEquity", default)]
    total_stockholder_equity: RawValue,
}

/// Yahoo wraps numbers as `{"raw": 12.3, "fmt": "12.30"}`.
#[derive(Debug, Default, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
}

impl RawValue {
    fn value(&self) -> Option<f64> {
        finite(self.raw)
    }
}

// ============================================================================
// Tests
// ============================================================================
