//! Technical indicator computation over daily bars.

use serde::{Deserialize, Serialize};

use crate::data::PriceBar;

/// Trading days in a 52-week window.
const TRADING_DAYS_52W: usize = 252;

/// Minimum bars before the 52-week high/low is considered meaningful.
const MIN_BARS_52W: usize = 20;

/// Simple moving average over the trailing `window` values.
///
/// Tolerates short histories down to half the window, after which the
/// result is None rather than a misleading average of a handful of bars.
pub fn sma(values: &[f64], window: usize) -> Option<f64> {
    let min_periods = (window / 2).max(1);
    if values.len() < min_periods {
        return None;
    }
    let tail = &values[values.len().saturating_sub(window)..];
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}

/// RSI over the trailing `period` deltas (simple rolling averages).
///
/// Needs `period + 1` closes. All-loss windows pin to 0, all-gain to 100.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let tail = &deltas[deltas.len() - period..];

    let avg_gain: f64 = tail.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
    let avg_loss: f64 = -tail.iter().filter(|d| **d < 0.0).sum::<f64>() / period as f64;

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

// ============================================================================
// Technical Snapshot
// ============================================================================

/// Key technicals for the last available day of a bar series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub close: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub rsi14: Option<f64>,
    pub volume: Option<f64>,
    pub volume_avg_50d: Option<f64>,
    pub high_52w: Option<f64>,
    pub low_52w: Option<f64>,
    pub price_above_200d: Option<bool>,
    pub sma50_above_200d: Option<bool>,
    /// Distance below the 52-week high (%), 0 at the high itself
    pub pct_below_52w_high: Option<f64>,
    /// Last-day volume as a multiple of the 50-day average
    pub volume_mult_vs_50d: Option<f64>,
}

impl TechnicalSnapshot {
    /// Compute the snapshot for a bar series (oldest first).
    /// Missing inputs yield None fields, never a panic.
    pub fn compute(bars: &[PriceBar]) -> Self {
        if bars.is_empty() {
            return Self::default();
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

        let close = closes.last().copied();
        let sma50 = sma(&closes, 50);
        let sma200 = sma(&closes, 200);
        let rsi14 = rsi(&closes, 14);
        let volume = volumes.last().copied();
        let volume_avg_50d = sma(&volumes, 50);

        let window_52w = &bars[bars.len().saturating_sub(TRADING_DAYS_52W)..];
        let (high_52w, low_52w) = if bars.len() >= MIN_BARS_52W {
            let high = window_52w
                .iter()
                .map(|b| b.high)
                .fold(f64::NEG_INFINITY, f64::max);
            let low = window_52w.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            (
                high.is_finite().then_some(high),
                low.is_finite().then_some(low),
            )
        } else {
            (None, None)
        };

        let price_above_200d = pair(close, sma200).map(|(c, s)| c > s);
        let sma50_above_200d = pair(sma50, sma200).map(|(a, b)| a > b);
        let pct_below_52w_high = pair(close, high_52w)
            .filter(|(_, h)| *h > 0.0)
            .map(|(c, h)| (1.0 - c / h) * 100.0);
        let volume_mult_vs_50d = pair(volume, volume_avg_50d)
            .filter(|(_, avg)| *avg > 0.0)
            .map(|(v, avg)| v / avg);

        Self {
            close,
            sma50,
            sma200,
            rsi14,
            volume,
            volume_avg_50d,
            high_52w,
            low_52w,
            price_above_200d,
            sma50_above_200d,
            pct_below_52w_high,
            volume_mult_vs_50d,
        }
    }
}

fn pair(a: Option<f64>, b: Option<f64>) -> Option<(f64, f64)> {
    Some((a?, b?))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars_with_closes(closes: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| PriceBar {
                date: start + chrono::Days::new(i as u64),
                open: *c,
                high: c + 1.0,
                low: c - 1.0,
                close: *c,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_sma_basic() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((sma(&values, 5).unwrap() - 3.0).abs() < f64::EPSILON);
        // Window larger than data but above half-window floor
        assert!((sma(&values, 8).unwrap() - 3.0).abs() < f64::EPSILON);
        // Below the half-window floor
        assert!(sma(&values, 20).is_none());
    }

    #[test]
    fn test_rsi_extremes() {
        let rising: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert!((rsi(&rising, 14).unwrap() - 100.0).abs() < f64::EPSILON);

        let falling: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        assert!(rsi(&falling, 14).unwrap().abs() < f64::EPSILON);

        let flat = vec![100.0; 30];
        assert!((rsi(&flat, 14).unwrap() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rsi_needs_enough_data() {
        assert!(rsi(&[100.0, 101.0], 14).is_none());
    }

    #[test]
    fn test_rsi_mixed_moves() {
        // Alternating +2/-1: avg_gain 1.0, avg_loss 0.5, RS=2, RSI=66.67
        let mut closes = vec![100.0];
        for i in 0..20 {
            let prev = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { prev + 2.0 } else { prev - 1.0 });
        }
        let value = rsi(&closes, 14).unwrap();
        assert!((value - 66.6666).abs() < 0.01);
    }

    #[test]
    fn test_snapshot_uptrend() {
        let closes: Vec<f64> = (0..300).map(|i| 100.0 + i as f64 * 0.5).collect();
        let snap = TechnicalSnapshot::compute(&bars_with_closes(&closes));

        assert_eq!(snap.price_above_200d, Some(true));
        assert_eq!(snap.sma50_above_200d, Some(true));
        // Last close is at the high of the window minus the +1.0 high offset
        assert!(snap.pct_below_52w_high.unwrap() < 1.0);
        assert!((snap.volume_mult_vs_50d.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_downtrend() {
        let closes: Vec<f64> = (0..300).map(|i| 400.0 - i as f64 * 0.5).collect();
        let snap = TechnicalSnapshot::compute(&bars_with_closes(&closes));

        assert_eq!(snap.price_above_200d, Some(false));
        assert_eq!(snap.sma50_above_200d, Some(false));
        assert!(snap.pct_below_52w_high.unwrap() > 30.0);
    }

    #[test]
    fn test_snapshot_short_history() {
        let closes = [100.0, 101.0, 102.0];
        let snap = TechnicalSnapshot::compute(&bars_with_closes(&closes));

        assert_eq!(snap.close, Some(102.0));
        assert!(snap.sma200.is_none());
        assert!(snap.price_above_200d.is_none());
        assert!(snap.high_52w.is_none());
        assert!(snap.pct_below_52w_high.is_none());
    }

    #[test]
    fn test_snapshot_empty() {
        let snap = TechnicalSnapshot::compute(&[]);
        assert_eq!(snap, TechnicalSnapshot::default());
    }
}
