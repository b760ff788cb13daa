//! Candidate ticker universe for recommendation ranking.

use crate::types::normalize_ticker;
use std::collections::BTreeSet;

/// Large-cap reference list used when no universe is configured.
pub const DEFAULT_UNIVERSE: &[&str] = &[
    "AAPL", "MSFT", "NVDA", "AMZN", "GOOGL", "META", "BRK.B", "TSLA", "AVGO", "LLY", "JPM", "V",
    "UNH", "XOM", "MA", "JNJ", "PG", "HD", "COST", "ABBV", "MRK", "WMT", "NFLX", "CRM", "BAC",
    "CVX", "KO", "AMD", "PEP", "ADBE", "TMO", "ORCL", "LIN", "ACN", "MCD", "CSCO", "ABT", "WFC",
    "INTU", "DHR", "QCOM", "TXN", "IBM", "GE", "AMGN", "CAT", "PM", "VZ", "ISRG", "NOW", "DIS",
    "UBER", "SPGI", "GS", "PFE", "CMCSA", "NEE", "RTX", "HON", "T", "LOW", "UNP", "BKNG", "ICE",
];

/// A deduplicated, normalized set of reference tickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    tickers: BTreeSet<String>,
}

impl Universe {
    /// Build from any list of symbols. Blank entries are ignored.
    pub fn new<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tickers: normalized(tickers),
        }
    }

    /// Number of reference tickers.
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Whether the reference set contains a ticker.
    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.contains(&normalize_ticker(ticker))
    }

    /// Reference tickers unioned with a caller's pins, sorted and deduplicated.
    pub fn candidates<S: AsRef<str>>(&self, pins: &[S]) -> Vec<String> {
        let mut all = self.tickers.clone();
        all.extend(normalized(pins));
        all.into_iter().collect()
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new(DEFAULT_UNIVERSE)
    }
}

/// Normalize symbols into a set, skipping blanks.
pub(crate) fn normalized<I, S>(tickers: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tickers
        .into_iter()
        .map(|t| normalize_ticker(t.as_ref()))
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_universe_is_deduplicated() {
        let universe = Universe::default();
        assert_eq!(universe.len(), DEFAULT_UNIVERSE.len());
        assert!(universe.contains("aapl"));
    }

    #[test]
    fn test_candidates_union_pins() {
        let universe = Universe::new(["msft", "AAPL", "aapl", " "]);
        assert_eq!(universe.len(), 2);

        let candidates = universe.candidates(&["xyz", "MSFT", ""]);
        assert_eq!(candidates, vec!["AAPL", "MSFT", "XYZ"]);
    }

    #[test]
    fn test_empty_universe_uses_pins_only() {
        let universe = Universe::new(Vec::<String>::new());
        assert!(universe.is_empty());
        assert_eq!(universe.candidates(&["ice"]), vec!["ICE"]);
    }
}
