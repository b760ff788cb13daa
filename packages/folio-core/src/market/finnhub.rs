//! Finnhub REST implementation of [`MarketDataGateway`].

use super::MarketDataGateway;
use crate::config::MarketConfig;
use crate::types::{normalize_ticker, DailyClose, NewsHeadline, Ratios, RecommendationCounts};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the Finnhub API.
#[derive(Debug, Clone)]
pub struct FinnhubGateway {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Deserialize)]
struct QuoteResponse {
    /// Current / last close price
    c: Option<f64>,
    /// Quote timestamp; zero for unknown symbols
    t: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationRow {
    period: Option<String>,
    strong_buy: Option<u32>,
    buy: Option<u32>,
    hold: Option<u32>,
    sell: Option<u32>,
    strong_sell: Option<u32>,
}

#[derive(Deserialize)]
struct MetricResponse {
    #[serde(default)]
    metric: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct CandleResponse {
    s: String,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    t: Vec<i64>,
}

#[derive(Deserialize)]
struct NewsRow {
    headline: String,
    url: String,
    source: Option<String>,
    datetime: Option<i64>,
}

impl FinnhubGateway {
    /// Create a client against `base_url` (e.g. `https://finnhub.io/api/v1`).
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            config.api_key.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let mut request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query);

        if let Some(ref key) = self.api_key {
            request = request.query(&[("token", key)]);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::Unavailable(format!("{}: rate limited", path)));
        }
        if status.is_server_error() {
            return Err(Error::Unavailable(format!("{}: HTTP {}", path, status)));
        }
        if !status.is_success() {
            return Err(Error::NoData(format!("{}: HTTP {}", path, status)));
        }

        Ok(response.json::<T>().await?)
    }
}

fn metric_value(metric: &HashMap<String, serde_json::Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| metric.get(*key).and_then(|v| v.as_f64()))
        .next()
}

fn unix_seconds(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

#[async_trait]
impl MarketDataGateway for FinnhubGateway {
    async fn last_close(&self, ticker: &str) -> Result<Decimal> {
        let ticker = normalize_ticker(ticker);
        let quote: QuoteResponse = self.get("/quote", &[("symbol", ticker.clone())]).await?;

        match (quote.c, quote.t) {
            (Some(price), Some(t)) if price > 0.0 && t > 0 => Decimal::from_f64(price)
                .ok_or_else(|| Error::NoData(format!("unrepresentable price for {}", ticker))),
            _ => Err(Error::NoData(format!("no quote for {}", ticker))),
        }
    }

    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>> {
        let ticker = normalize_ticker(ticker);
        let candles: CandleResponse = self
            .get(
                "/stock/candle",
                &[
                    ("symbol", ticker.clone()),
                    ("resolution", "D".to_string()),
                    ("from", unix_seconds(start).to_string()),
                    ("to", unix_seconds(end.succ_opt().unwrap_or(end)).to_string()),
                ],
            )
            .await?;

        if candles.s != "ok" {
            debug!(ticker = %ticker, status = %candles.s, "no candles returned");
            return Ok(Vec::new());
        }

        let mut closes: Vec<DailyClose> = candles
            .t
            .iter()
            .zip(candles.c.iter())
            .filter_map(|(&ts, &close)| {
                DateTime::from_timestamp(ts, 0).map(|dt| DailyClose {
                    date: dt.date_naive(),
                    close,
                })
            })
            .filter(|c| c.date >= start && c.date <= end)
            .collect();
        closes.sort_by_key(|c| c.date);
        Ok(closes)
    }

    async fn recommendation_counts(&self, ticker: &str) -> Result<RecommendationCounts> {
        let ticker = normalize_ticker(ticker);
        let rows: Vec<RecommendationRow> = self
            .get("/stock/recommendation", &[("symbol", ticker.clone())])
            .await?;

        rows.into_iter()
            .max_by(|a, b| a.period.cmp(&b.period))
            .map(|row| RecommendationCounts {
                period: row.period,
                strong_buy: row.strong_buy,
                buy: row.buy,
                hold: row.hold,
                sell: row.sell,
                strong_sell: row.strong_sell,
            })
            .ok_or_else(|| Error::NoData(format!("no recommendations for {}", ticker)))
    }

    async fn ratios(&self, ticker: &str) -> Result<Ratios> {
        let ticker = normalize_ticker(ticker);
        let response: MetricResponse = self
            .get(
                "/stock/metric",
                &[("symbol", ticker), ("metric", "all".to_string())],
            )
            .await?;

        let metric = &response.metric;
        Ok(Ratios {
            debt_to_equity: metric_value(
                metric,
                &["totalDebt/totalEquityQuarterly", "totalDebt/totalEquityAnnual"],
            ),
            current_ratio: metric_value(metric, &["currentRatioQuarterly", "currentRatioAnnual"]),
            quick_ratio: metric_value(metric, &["quickRatioQuarterly", "quickRatioAnnual"]),
        })
    }

    async fn company_news(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsHeadline>> {
        let ticker = normalize_ticker(ticker);
        let rows: Vec<NewsRow> = self
            .get(
                "/company-news",
                &[
                    ("symbol", ticker),
                    ("from", from.format("%Y-%m-%d").to_string()),
                    ("to", to.format("%Y-%m-%d").to_string()),
                ],
            )
            .await?;

        let mut news: Vec<NewsHeadline> = rows
            .into_iter()
            .map(|row| NewsHeadline {
                headline: row.headline,
                link: row.url,
                source: row.source,
                published_at: row.datetime.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            })
            .collect();
        news.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(news)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use rust_decimal_macros::dec;

    fn gateway(url: &str) -> FinnhubGateway {
        FinnhubGateway::new(url, Some("test-key".to_string()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_last_close() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/quote")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "AAPL".into()),
                Matcher::UrlEncoded("token".into(), "test-key".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"c": 189.5, "d": 1.2, "pc": 188.3, "t": 1717000000}"#)
            .create_async()
            .await;

        let price = gateway(&server.url()).last_close("aapl").await.unwrap();
        assert_eq!(price, dec!(189.5));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_no_data() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"c": 0, "d": null, "pc": 0, "t": 0}"#)
            .create_async()
            .await;

        let result = gateway(&server.url()).last_close("NOPE").await;
        assert!(matches!(result, Err(Error::NoData(_))));
    }

    #[tokio::test]
    async fn test_rate_limit_is_unavailable() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/stock/recommendation")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let result = gateway(&server.url()).recommendation_counts("AAPL").await;
        assert!(matches!(result, Err(Error::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_recommendation_uses_latest_period() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/stock/recommendation")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[
                    {"period": "2025-02-01", "strongBuy": 1, "buy": 1, "hold": 1, "sell": 1, "strongSell": 1, "symbol": "AAPL"},
                    {"period": "2025-03-01", "strongBuy": 13, "buy": 24, "hold": 7, "sell": 0, "strongSell": 0, "symbol": "AAPL"}
                ]"#,
            )
            .create_async()
            .await;

        let counts = gateway(&server.url())
            .recommendation_counts("AAPL")
            .await
            .unwrap();
        assert_eq!(counts.period.as_deref(), Some("2025-03-01"));
        assert_eq!(counts.strong_buy, Some(13));
        assert_eq!(counts.buy, Some(24));
    }

    #[tokio::test]
    async fn test_missing_ratio_stays_none() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/stock/metric")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"metric": {"currentRatioQuarterly": 1.07, "quickRatioAnnual": 0.9, "totalDebt/totalEquityQuarterly": null}, "symbol": "AAPL"}"#,
            )
            .create_async()
            .await;

        let ratios = gateway(&server.url()).ratios("AAPL").await.unwrap();
        assert_eq!(ratios.current_ratio, Some(1.07));
        assert_eq!(ratios.quick_ratio, Some(0.9));
        assert!(ratios.debt_to_equity.is_none());
    }

    #[tokio::test]
    async fn test_candles_no_data_is_empty() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/stock/candle")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"s": "no_data"}"#)
            .create_async()
            .await;

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let closes = gateway(&server.url())
            .daily_closes("AAPL", start, end)
            .await
            .unwrap();
        assert!(closes.is_empty());
    }

    #[tokio::test]
    async fn test_candles_are_dated_and_ordered() {
        let mut server = Server::new_async().await;
        // 2024-01-03 and 2024-01-02 at 00:00 UTC, deliberately out of order
        server
            .mock("GET", "/stock/candle")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"s": "ok", "c": [101.0, 100.0], "t": [1704240000, 1704153600]}"#)
            .create_async()
            .await;

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let closes = gateway(&server.url())
            .daily_closes("AAPL", start, end)
            .await
            .unwrap();

        assert_eq!(closes.len(), 2);
        assert_eq!(closes[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(closes[0].close, 100.0);
    }
}
