//! Moving-average indicators over daily closes.
//!
//! - **SMA**: Simple Moving Average
//! - **Crossovers**: fast/slow SMA regime changes, reported as Buy/Sell rows

mod sma;

pub use sma::sma;

use crate::types::{DailyClose, Rating};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default fast window (days).
pub const FAST_PERIOD: usize = 20;
/// Default slow window (days).
pub const SLOW_PERIOD: usize = 50;

/// A day on which the fast/slow regime started or flipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrossoverEvent {
    pub date: NaiveDate,
    pub close: f64,
    pub fast_ma: f64,
    pub slow_ma: f64,
    /// `Buy` while the fast average is above the slow one, else `Sell`
    pub signal: Rating,
}

/// Report each day the moving-average regime changes.
///
/// The regime is `Buy` when the fast SMA is strictly above the slow SMA and
/// `Sell` otherwise. Days before both averages exist are ignored; the first
/// day with both averages is always reported as it opens the first regime.
/// `closes` must be in date order.
pub fn crossover_events(closes: &[DailyClose], fast: usize, slow: usize) -> Vec<CrossoverEvent> {
    let prices: Vec<f64> = closes.iter().map(|c| c.close).collect();
    let fast_ma = sma(&prices, fast);
    let slow_ma = sma(&prices, slow);

    let mut events = Vec::new();
    let mut regime: Option<Rating> = None;

    for (i, day) in closes.iter().enumerate() {
        let (Some(f), Some(s)) = (fast_ma[i], slow_ma[i]) else {
            continue;
        };
        let signal = if f > s { Rating::Buy } else { Rating::Sell };

        if regime != Some(signal) {
            events.push(CrossoverEvent {
                date: day.date,
                close: day.close,
                fast_ma: f,
                slow_ma: s,
                signal,
            });
            regime = Some(signal);
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<DailyClose> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, close)| DailyClose {
                date: start + chrono::Days::new(i as u64),
                close: *close,
            })
            .collect()
    }

    #[test]
    fn test_crossovers() {
        // Falls, then rises, then falls again
        let closes = series(&[10.0, 9.0, 8.0, 7.0, 9.0, 12.0, 14.0, 10.0, 6.0, 4.0]);
        let events = crossover_events(&closes, 2, 3);

        let signals: Vec<_> = events.iter().map(|e| e.signal).collect();
        assert_eq!(signals, vec![Rating::Sell, Rating::Buy, Rating::Sell]);

        // First regime opens once the slow average exists
        assert_eq!(events[0].date, closes[2].date);
        // Index 4 has fast == slow == 8.0, which stays Sell
        assert_eq!(events[1].date, closes[5].date);
        assert_eq!(events[1].close, 12.0);
        // Index 7: fast (14 + 10) / 2 == slow (12 + 14 + 10) / 3
        assert_eq!(events[2].date, closes[7].date);
        assert_eq!(events[2].fast_ma, 12.0);
    }

    #[test]
    fn test_steady_trend_reports_once() {
        let closes = series(&(0..60).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let events = crossover_events(&closes, FAST_PERIOD, SLOW_PERIOD);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].signal, Rating::Buy);
        assert_eq!(events[0].date, closes[SLOW_PERIOD - 1].date);
    }

    #[test]
    fn test_short_history_has_no_events() {
        let closes = series(&[1.0, 2.0, 3.0]);
        assert!(crossover_events(&closes, FAST_PERIOD, SLOW_PERIOD).is_empty());
    }
}
