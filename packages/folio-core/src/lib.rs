//! Folio Core - holdings ledger and market analytics for portfolio tracking.
//!
//! This crate provides the core of a portfolio-tracking backend:
//!
//! - **Holdings ledger**: per-user, per-ticker positions with a decimal
//!   weighted-average cost basis, pins, and optimistic-concurrency commits
//! - **Recommendation ranking**: analyst buy/hold/sell counts reduced to a
//!   bounded, deterministically ordered top-N list
//! - **Risk summaries**: annualized volatility plus point-in-time ratios
//! - **Signals**: moving-average crossover regimes over daily closes
//!
//! # Example
//!
//! ```rust,no_run
//! use folio_core::ledger::{HoldingsLedger, MemoryStore, NullSink};
//! use rust_decimal::Decimal;
//!
//! # async fn demo() -> folio_core::Result<()> {
//! let ledger = HoldingsLedger::new(MemoryStore::new(), NullSink);
//!
//! // Buy 10 shares at $85.50
//! let outcome = ledger
//!     .apply_trade("me@example.com", "ice", Decimal::new(8550, 2), 10)
//!     .await?;
//! println!("{} shares at ${}", outcome.holding.shares, outcome.holding.avg_cost);
//!
//! let holdings = ledger.list_holdings("me@example.com").await?;
//! println!("Open records: {}", holdings.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod indicators;
pub mod ledger;
pub mod market;
pub mod portfolio;
pub mod recommend;
pub mod types;

// Re-export commonly used types
pub use config::FolioConfig;
pub use types::{
    ApiResponse, DailyClose, EnrichedHolding, Holding, HoldingKey, Metric, NewsHeadline,
    Rating, RankedCandidate, Ratios, RecommendationCounts, RiskSummary,
};

// Re-export main functionality
pub use indicators::{crossover_events, sma, CrossoverEvent};
pub use ledger::{Disposition, HoldingsLedger, TradeOutcome};
pub use market::{FetchPolicy, MarketDataGateway, Universe};
pub use portfolio::{annualized_volatility, daily_returns, PortfolioSnapshot, RiskSummarizer};
pub use recommend::{score_counts, Ranking, RecommendationRanker};

/// Error types for folio-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Insufficient shares of {ticker}: held {held}, requested {requested}")]
    InsufficientShares {
        ticker: String,
        held: u64,
        requested: u64,
    },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Active position: {0}")]
    ActivePosition(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidOperation(_) => "invalid_operation",
            Error::InsufficientShares { .. } => "insufficient_shares",
            Error::AlreadyExists(_) => "already_exists",
            Error::NotFound(_) => "not_found",
            Error::ActivePosition(_) => "active_position",
            Error::NoData(_) => "no_data",
            Error::Unavailable(_) => "unavailable",
            Error::Storage(_) => "storage",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Unavailable(_) | Error::Io(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::NoData(err.to_string())
        } else {
            Error::Unavailable(err.to_string())
        }
    }
}

/// Result type for folio-core operations.
pub type Result<T> = std::result::Result<T, Error>;
