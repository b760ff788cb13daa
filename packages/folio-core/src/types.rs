//! Core data types for the folio portfolio tracker.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Uniqueness key of a holding: one record per (owner, ticker).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HoldingKey {
    /// Owner identifier, lower-cased
    pub owner: String,
    /// Ticker symbol, upper-cased
    pub ticker: String,
}

impl HoldingKey {
    /// Normalize and validate an (owner, ticker) pair.
    pub fn new(owner: &str, ticker: &str) -> Result<Self> {
        let owner = normalize_owner(owner);
        let ticker = normalize_ticker(ticker);

        if owner.is_empty() {
            return Err(Error::InvalidOperation("owner must not be empty".to_string()));
        }
        if ticker.is_empty() {
            return Err(Error::InvalidOperation("ticker must not be empty".to_string()));
        }

        Ok(Self { owner, ticker })
    }
}

impl fmt::Display for HoldingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.ticker)
    }
}

/// Lower-case and trim an owner identifier (e.g. an email address).
pub fn normalize_owner(owner: &str) -> String {
    owner.trim().to_lowercase()
}

/// Upper-case and trim a ticker symbol.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// A user's position in one ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Holding {
    /// Owner identifier (lower-cased)
    pub owner: String,
    /// Stock ticker symbol (uppercase)
    pub ticker: String,
    /// Number of shares currently held
    pub shares: u64,
    /// Weighted average price paid per currently held share
    pub avg_cost: Decimal,
    /// Cost-basis value (shares * avg_cost)
    pub market_value: Decimal,
    /// Surfaced in watch views even with zero shares
    pub pinned: bool,
}

impl Holding {
    /// A freshly opened position. New positions are implicitly pinned.
    pub fn opened(key: &HoldingKey, shares: u64, price: Decimal) -> Self {
        let mut holding = Self {
            owner: key.owner.clone(),
            ticker: key.ticker.clone(),
            shares,
            avg_cost: price,
            market_value: Decimal::ZERO,
            pinned: true,
        };
        holding.market_value = holding.cost_value();
        holding
    }

    /// A watch-only record with no shares and no cost history.
    pub fn pin_only(key: &HoldingKey) -> Self {
        Self {
            owner: key.owner.clone(),
            ticker: key.ticker.clone(),
            shares: 0,
            avg_cost: Decimal::ZERO,
            market_value: Decimal::ZERO,
            pinned: true,
        }
    }

    /// The record's uniqueness key.
    pub fn key(&self) -> HoldingKey {
        HoldingKey {
            owner: self.owner.clone(),
            ticker: self.ticker.clone(),
        }
    }

    /// `shares * avg_cost`.
    pub fn cost_value(&self) -> Decimal {
        Decimal::from(self.shares) * self.avg_cost
    }

    /// Records with no shares and no pin are logically deleted.
    pub fn is_visible(&self) -> bool {
        self.shares > 0 || self.pinned
    }

    /// Closed positions keep their cost basis as history.
    pub fn has_cost_history(&self) -> bool {
        !self.avg_cost.is_zero()
    }
}

/// A holding enriched with a live quote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedHolding {
    #[serde(flatten)]
    pub holding: Holding,
    /// Last close from the market data gateway
    pub last_quote: Option<Decimal>,
    /// (last_quote - avg_cost) / avg_cost * 100
    pub total_return: Option<Decimal>,
}

impl EnrichedHolding {
    /// Wrap a holding with no quote attached.
    pub fn unquoted(holding: Holding) -> Self {
        Self {
            holding,
            last_quote: None,
            total_return: None,
        }
    }

    /// Attach a quote and compute the total return when a cost basis exists.
    /// A return too large for `Decimal` is left out.
    pub fn with_quote(holding: Holding, quote: Decimal) -> Self {
        let total_return = if holding.avg_cost > Decimal::ZERO {
            quote
                .checked_sub(holding.avg_cost)
                .and_then(|gain| gain.checked_div(holding.avg_cost))
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        } else {
            None
        };

        Self {
            holding,
            last_quote: Some(quote),
            total_return,
        }
    }

    /// Live value of the shares held, if a quote is attached and the value
    /// fits in a `Decimal`.
    pub fn quoted_value(&self) -> Option<Decimal> {
        self.last_quote
            .and_then(|quote| Decimal::from(self.holding.shares).checked_mul(quote))
    }
}

/// Analyst consensus category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Rating {
    Buy,
    Hold,
    Sell,
}

/// A scored candidate from the recommendation ranker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedCandidate {
    /// Stock ticker symbol
    pub ticker: String,
    /// Winning category
    pub rating: Rating,
    /// Probability mass of the winning category, in [0, 1]
    pub score: f64,
}

/// Analyst recommendation counts for the most recent period.
///
/// Fields are optional because upstream payloads are not guaranteed to be
/// complete; scoring rejects vectors with missing fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationCounts {
    /// Period the counts refer to (e.g. `2025-03-01`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    pub strong_buy: Option<u32>,
    pub buy: Option<u32>,
    pub hold: Option<u32>,
    pub sell: Option<u32>,
    pub strong_sell: Option<u32>,
}

/// Point-in-time fundamental ratios.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Ratios {
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
}

/// One daily closing price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// A news headline for a ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsHeadline {
    pub headline: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// A value that is either known or explicitly unavailable.
///
/// Serializes as the bare value, or as the string `"unavailable"`. A missing
/// ratio must never be reported as zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric<T> {
    Value(T),
    Unavailable,
}

const UNAVAILABLE: &str = "unavailable";

impl<T> Metric<T> {
    /// The value, if available.
    pub fn value(&self) -> Option<&T> {
        match self {
            Metric::Value(v) => Some(v),
            Metric::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Metric::Value(_))
    }
}

impl<T> From<Option<T>> for Metric<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Metric::Value(v),
            None => Metric::Unavailable,
        }
    }
}

impl<T: Serialize> Serialize for Metric<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Metric::Value(v) => v.serialize(serializer),
            Metric::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Metric<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if raw.as_str() == Some(UNAVAILABLE) || raw.is_null() {
            return Ok(Metric::Unavailable);
        }
        serde_json::from_value(raw)
            .map(Metric::Value)
            .map_err(serde::de::Error::custom)
    }
}

/// Risk payload for a single ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskSummary {
    /// Stock ticker symbol
    pub ticker: String,
    /// Annualized volatility (sample stddev of daily returns * sqrt(252))
    pub volatility: Metric<f64>,
    pub debt_to_equity: Metric<f64>,
    pub current_ratio: Metric<f64>,
    pub quick_ratio: Metric<f64>,
    /// Most recent close in the series
    pub latest_close: f64,
    /// Date of the most recent close
    pub as_of: NaiveDate,
    /// Number of closes the volatility was computed from
    pub observations: usize,
}

/// API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
            code: None,
        }
    }

    /// Create an error response carrying the error's kind.
    pub fn from_error(error: &Error) -> Self {
        Self {
            code: Some(error.code().to_string()),
            ..Self::err(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_holding_key_normalizes() {
        let key = HoldingKey::new("  Me@Example.COM ", " ice ").unwrap();
        assert_eq!(key.owner, "me@example.com");
        assert_eq!(key.ticker, "ICE");
    }

    #[test]
    fn test_holding_key_rejects_blank() {
        assert!(matches!(
            HoldingKey::new("", "ICE"),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            HoldingKey::new("me@example.com", "   "),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_holding_opened() {
        let key = HoldingKey::new("me@example.com", "ICE").unwrap();
        let holding = Holding::opened(&key, 10, dec!(85.50));

        assert_eq!(holding.shares, 10);
        assert_eq!(holding.avg_cost, dec!(85.50));
        assert_eq!(holding.market_value, dec!(855.00));
        assert!(holding.pinned);
        assert!(holding.is_visible());
    }

    #[test]
    fn test_visibility() {
        let key = HoldingKey::new("me@example.com", "ICE").unwrap();
        let mut holding = Holding::opened(&key, 10, dec!(85.50));
        holding.shares = 0;
        holding.pinned = false;
        assert!(!holding.is_visible());
        assert!(holding.has_cost_history());

        assert!(Holding::pin_only(&key).is_visible());
        assert!(!Holding::pin_only(&key).has_cost_history());
    }

    #[test]
    fn test_enriched_total_return() {
        let key = HoldingKey::new("me@example.com", "ICE").unwrap();
        let enriched = EnrichedHolding::with_quote(Holding::opened(&key, 10, dec!(100)), dec!(125));

        assert_eq!(enriched.last_quote, Some(dec!(125)));
        assert_eq!(enriched.total_return, Some(dec!(25)));
        assert_eq!(enriched.quoted_value(), Some(dec!(1250)));
    }

    #[test]
    fn test_enriched_pin_has_no_return() {
        let key = HoldingKey::new("me@example.com", "XYZ").unwrap();
        let enriched = EnrichedHolding::with_quote(Holding::pin_only(&key), dec!(12.5));

        assert_eq!(enriched.last_quote, Some(dec!(12.5)));
        assert!(enriched.total_return.is_none());
    }

    #[test]
    fn test_enriched_overflow_has_no_value() {
        let key = HoldingKey::new("me@example.com", "HUGE").unwrap();
        let enriched =
            EnrichedHolding::with_quote(Holding::opened(&key, 1_000, dec!(0.0001)), Decimal::MAX);

        assert_eq!(enriched.last_quote, Some(Decimal::MAX));
        assert!(enriched.total_return.is_none());
        assert!(enriched.quoted_value().is_none());
    }

    #[test]
    fn test_metric_serialization() {
        let value: Metric<f64> = Metric::Value(1.5);
        let missing: Metric<f64> = None.into();

        assert_eq!(serde_json::to_string(&value).unwrap(), "1.5");
        assert_eq!(serde_json::to_string(&missing).unwrap(), "\"unavailable\"");

        let parsed: Metric<f64> = serde_json::from_str("\"unavailable\"").unwrap();
        assert_eq!(parsed, Metric::Unavailable);
        let parsed: Metric<f64> = serde_json::from_str("0.0").unwrap();
        assert_eq!(parsed, Metric::Value(0.0));
    }

    #[test]
    fn test_api_response() {
        let response: ApiResponse<String> = ApiResponse::ok("test".to_string());
        assert!(response.ok);
        assert_eq!(response.data, Some("test".to_string()));

        let err_response: ApiResponse<String> =
            ApiResponse::from_error(&Error::NotFound("me/XYZ".into()));
        assert!(!err_response.ok);
        assert_eq!(err_response.code.as_deref(), Some("not_found"));
    }
}
