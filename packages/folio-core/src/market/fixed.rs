//! In-memory gateway serving fixed data.
//!
//! Useful for offline runs and tests: every ticker's payloads are registered
//! up front, and individual tickers can be made slow or failing.

use super::MarketDataGateway;
use crate::types::{normalize_ticker, DailyClose, NewsHeadline, Ratios, RecommendationCounts};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Gateway backed by registered fixtures.
#[derive(Debug, Default)]
pub struct StaticGateway {
    quotes: HashMap<String, Decimal>,
    closes: HashMap<String, Vec<DailyClose>>,
    counts: HashMap<String, RecommendationCounts>,
    ratios: HashMap<String, Ratios>,
    news: HashMap<String, Vec<NewsHeadline>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl StaticGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(mut self, ticker: &str, price: Decimal) -> Self {
        self.quotes.insert(normalize_ticker(ticker), price);
        self
    }

    pub fn with_closes(mut self, ticker: &str, closes: Vec<DailyClose>) -> Self {
        self.closes.insert(normalize_ticker(ticker), closes);
        self
    }

    pub fn with_counts(mut self, ticker: &str, counts: RecommendationCounts) -> Self {
        self.counts.insert(normalize_ticker(ticker), counts);
        self
    }

    pub fn with_ratios(mut self, ticker: &str, ratios: Ratios) -> Self {
        self.ratios.insert(normalize_ticker(ticker), ratios);
        self
    }

    pub fn with_news(mut self, ticker: &str, news: Vec<NewsHeadline>) -> Self {
        self.news.insert(normalize_ticker(ticker), news);
        self
    }

    /// Every request for `ticker` fails with [`Error::Unavailable`].
    pub fn failing(mut self, ticker: &str) -> Self {
        self.failing.insert(normalize_ticker(ticker));
        self
    }

    /// Every request for `ticker` sleeps before answering.
    pub fn with_delay(mut self, ticker: &str, delay: Duration) -> Self {
        self.delays.insert(normalize_ticker(ticker), delay);
        self
    }

    /// Number of requests served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    async fn enter(&self, ticker: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let ticker = normalize_ticker(ticker);

        if let Some(delay) = self.delays.get(&ticker) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&ticker) {
            return Err(Error::Unavailable(format!("{} request failed", ticker)));
        }
        Ok(ticker)
    }
}

fn lookup<T: Clone>(map: &HashMap<String, T>, ticker: &str, what: &str) -> Result<T> {
    map.get(ticker)
        .cloned()
        .ok_or_else(|| Error::NoData(format!("no {} for {}", what, ticker)))
}

#[async_trait]
impl MarketDataGateway for StaticGateway {
    async fn last_close(&self, ticker: &str) -> Result<Decimal> {
        let ticker = self.enter(ticker).await?;
        lookup(&self.quotes, &ticker, "quote")
    }

    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>> {
        let ticker = self.enter(ticker).await?;
        Ok(self
            .closes
            .get(&ticker)
            .map(|closes| {
                closes
                    .iter()
                    .filter(|c| c.date >= start && c.date <= end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn recommendation_counts(&self, ticker: &str) -> Result<RecommendationCounts> {
        let ticker = self.enter(ticker).await?;
        lookup(&self.counts, &ticker, "recommendations")
    }

    async fn ratios(&self, ticker: &str) -> Result<Ratios> {
        let ticker = self.enter(ticker).await?;
        lookup(&self.ratios, &ticker, "ratios")
    }

    async fn company_news(
        &self,
        ticker: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<NewsHeadline>> {
        let ticker = self.enter(ticker).await?;
        Ok(self.news.get(&ticker).cloned().unwrap_or_default())
    }
}
