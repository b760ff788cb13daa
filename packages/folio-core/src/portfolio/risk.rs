//! Per-ticker risk summaries.
//!
//! Combines annualized volatility of daily returns with point-in-time
//! leverage and liquidity ratios.

use crate::config::FolioConfig;
use crate::market::{FetchPolicy, MarketDataGateway};
use crate::types::{normalize_ticker, Metric, Ratios, RiskSummary};
use crate::{Error, Result};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::debug;

/// Trading days per year used to annualize daily volatility.
pub const TRADING_DAYS: f64 = 252.0;

/// Simple returns over consecutive closes.
///
/// Pairs whose earlier close is not positive are skipped.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|pair| pair[0] > 0.0)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect()
}

/// Annualized volatility: sample standard deviation of `returns` times √252.
///
/// Returns `None` when fewer than two returns are available.
pub fn annualized_volatility(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);

    Some(variance.sqrt() * TRADING_DAYS.sqrt())
}

/// Builds [`RiskSummary`] values from gateway data.
#[derive(Debug)]
pub struct RiskSummarizer<G: ?Sized> {
    gateway: Arc<G>,
    history_start: NaiveDate,
    policy: FetchPolicy,
}

impl<G: MarketDataGateway + ?Sized> RiskSummarizer<G> {
    pub fn new(gateway: Arc<G>, history_start: NaiveDate, policy: FetchPolicy) -> Self {
        Self {
            gateway,
            history_start,
            policy,
        }
    }

    pub fn from_config(gateway: Arc<G>, config: &FolioConfig) -> Self {
        Self::new(gateway, config.risk.history_start, config.fetch.policy())
    }

    /// Summarize risk for `ticker` over closes from the history start to today.
    ///
    /// No closes at all is [`Error::NoData`]. A failed ratio fetch degrades
    /// every ratio to [`Metric::Unavailable`] instead of failing the summary.
    pub async fn summarize(&self, ticker: &str) -> Result<RiskSummary> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(Error::InvalidOperation("ticker must not be empty".to_string()));
        }

        let today = Utc::now().date_naive();
        let per_call = self.policy.per_call_timeout;

        let (closes, ratios) = tokio::join!(
            timeout(
                per_call,
                self.gateway.daily_closes(&ticker, self.history_start, today)
            ),
            timeout(per_call, self.gateway.ratios(&ticker)),
        );

        let mut closes = closes.map_err(|_| {
            Error::Unavailable(format!("{} price history timed out after {:?}", ticker, per_call))
        })??;
        closes.sort_by_key(|c| c.date);

        let last = match closes.last() {
            Some(last) => *last,
            None => {
                return Err(Error::NoData(format!(
                    "no price history for {} since {}",
                    ticker, self.history_start
                )))
            }
        };

        let ratios = match ratios {
            Ok(Ok(ratios)) => ratios,
            Ok(Err(e)) => {
                debug!(ticker = %ticker, error = %e, "ratios unavailable");
                Ratios::default()
            }
            Err(_) => {
                debug!(ticker = %ticker, "ratio fetch timed out");
                Ratios::default()
            }
        };

        let prices: Vec<f64> = closes.iter().map(|c| c.close).collect();
        let returns = daily_returns(&prices);

        Ok(RiskSummary {
            volatility: annualized_volatility(&returns).into(),
            debt_to_equity: Metric::from(ratios.debt_to_equity),
            current_ratio: Metric::from(ratios.current_ratio),
            quick_ratio: Metric::from(ratios.quick_ratio),
            latest_close: last.close,
            as_of: last.date,
            observations: closes.len(),
            ticker,
        })
    }
}
