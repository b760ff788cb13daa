//! Market data boundary.
//!
//! Defines the gateway trait the ranker, risk summarizer and holdings
//! enrichment consume, the bounded fan-out helper they share, and the
//! ticker universe.

mod finnhub;
mod fixed;
mod universe;

pub use finnhub::FinnhubGateway;
pub use fixed::StaticGateway;
pub use universe::{Universe, DEFAULT_UNIVERSE};
pub(crate) use universe::normalized as normalized_tickers;

use crate::types::{DailyClose, NewsHeadline, Ratios, RecommendationCounts};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::future::Future;
use std::pin::pin;
use std::time::Duration;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, warn};

/// Source of quotes, history, fundamentals and analyst consensus.
///
/// Implementations report transient failures (network, rate limits) as
/// [`Error::Unavailable`] and absent data as [`Error::NoData`].
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Most recent closing price.
    async fn last_close(&self, ticker: &str) -> Result<Decimal>;

    /// Daily closes in `[start, end]`, oldest first.
    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>>;

    /// Analyst recommendation counts for the most recent period.
    async fn recommendation_counts(&self, ticker: &str) -> Result<RecommendationCounts>;

    /// Point-in-time leverage and liquidity ratios.
    async fn ratios(&self, ticker: &str) -> Result<Ratios>;

    /// Headlines published in `[from, to]`, newest first.
    async fn company_news(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsHeadline>>;
}

/// Limits applied to per-ticker fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Maximum requests in flight
    pub concurrency: usize,
    /// Timeout for each request
    pub per_call_timeout: Duration,
    /// Bound on the whole fan-out
    pub deadline: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            concurrency: 8,
            per_call_timeout: Duration::from_secs(5),
            deadline: Duration::from_secs(30),
        }
    }
}

/// Run `fetch` for every ticker with bounded concurrency.
///
/// Each call is bounded by `per_call_timeout` (a timeout becomes
/// [`Error::Unavailable`]). Once the overall deadline passes, calls still in
/// flight are dropped and only completed results are returned, in completion
/// order.
pub async fn fetch_each<T, F, Fut>(
    tickers: Vec<String>,
    policy: &FetchPolicy,
    fetch: F,
) -> Vec<(String, Result<T>)>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let total = tickers.len();
    let per_call = policy.per_call_timeout;
    let deadline = Instant::now() + policy.deadline;

    let mut results = pin!(stream::iter(tickers)
        .map(|ticker| {
            let call = fetch(ticker.clone());
            async move {
                let result = match timeout(per_call, call).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Unavailable(format!(
                        "{} timed out after {:?}",
                        ticker, per_call
                    ))),
                };
                (ticker, result)
            }
        })
        .buffer_unordered(policy.concurrency.max(1)));

    let mut completed = Vec::with_capacity(total);
    loop {
        match timeout_at(deadline, results.next()).await {
            Ok(Some(item)) => completed.push(item),
            Ok(None) => break,
            Err(_) => {
                warn!(
                    completed = completed.len(),
                    total,
                    "fetch deadline reached, dropping pending requests"
                );
                break;
            }
        }
    }

    debug!(completed = completed.len(), total, "fan-out finished");
    completed
}
