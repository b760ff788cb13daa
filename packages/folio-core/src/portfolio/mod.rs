//! Portfolio analytics module.
//!
//! Provides portfolio totals and per-ticker risk summaries.

mod performance;
mod risk;

pub use performance::PortfolioSnapshot;
pub use risk::{annualized_volatility, daily_returns, RiskSummarizer, TRADING_DAYS};
