//! Recommendation ranking over the reference universe and a caller's pins.

mod scoring;

pub use scoring::score_counts;

use crate::config::FolioConfig;
use crate::market::{fetch_each, normalized_tickers, FetchPolicy, MarketDataGateway, Universe};
use crate::types::{RankedCandidate, Rating};
use crate::{Error, Result};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Number of ranked entries before pins are added to the limit.
pub const DEFAULT_BASE_SIZE: usize = 30;

/// A ranked, bounded list of recommendations.
///
/// Serializes as a JSON object keyed by ticker in rank order:
/// `{"AAPL": {"rating": "Buy", "score": 0.8}, ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    entries: Vec<RankedCandidate>,
    skipped: Vec<String>,
}

impl Ranking {
    /// Ranked entries, best first.
    pub fn entries(&self) -> &[RankedCandidate] {
        &self.entries
    }

    /// Candidates that could not be scored, sorted.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Value half of a serialized ranking entry.
struct RatedScore<'a>(&'a RankedCandidate);

impl Serialize for RatedScore<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut entry = serializer.serialize_struct("RatedScore", 2)?;
        entry.serialize_field("rating", &self.0.rating)?;
        entry.serialize_field("score", &self.0.score)?;
        entry.end()
    }
}

impl Serialize for Ranking {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.ticker, &RatedScore(entry))?;
        }
        map.end()
    }
}

fn rank_order(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.ticker.cmp(&b.ticker))
}

/// Scores analyst consensus across candidate tickers.
#[derive(Debug)]
pub struct RecommendationRanker<G: ?Sized> {
    gateway: Arc<G>,
    universe: Universe,
    policy: FetchPolicy,
    base_size: usize,
}

impl<G: MarketDataGateway + ?Sized> RecommendationRanker<G> {
    pub fn new(gateway: Arc<G>, universe: Universe, policy: FetchPolicy) -> Self {
        Self {
            gateway,
            universe,
            policy,
            base_size: DEFAULT_BASE_SIZE,
        }
    }

    pub fn from_config(gateway: Arc<G>, config: &FolioConfig) -> Self {
        Self::new(
            gateway,
            Universe::new(&config.ranking.universe),
            config.fetch.policy(),
        )
        .with_base_size(config.ranking.base_size)
    }

    pub fn with_base_size(mut self, base_size: usize) -> Self {
        self.base_size = base_size;
        self
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Rank the reference universe together with `pins`.
    ///
    /// Candidates whose counts fail to load, time out, are incomplete or sum
    /// to zero are skipped. At most `base_size + distinct pins` entries are
    /// returned, ordered by score descending then ticker ascending.
    pub async fn rank<S: AsRef<str>>(&self, pins: &[S]) -> Result<Ranking> {
        let candidates = self.universe.candidates(pins);
        let distinct_pins = normalized_tickers(pins).len();
        let limit = self.base_size + distinct_pins;
        let gateway = &self.gateway;

        let attempted = candidates.len();
        let mut unanswered: BTreeSet<String> = candidates.iter().cloned().collect();

        let results = fetch_each(candidates, &self.policy, |ticker| async move {
            gateway.recommendation_counts(&ticker).await
        })
        .await;

        let mut entries = Vec::new();
        let mut skipped = Vec::new();
        for (ticker, result) in results {
            unanswered.remove(&ticker);
            match result {
                Ok(counts) => match score_counts(&ticker, &counts) {
                    Some(scored) => entries.push(scored),
                    None => {
                        debug!(ticker = %ticker, "incomplete or empty recommendation counts");
                        skipped.push(ticker);
                    }
                },
                Err(e) => {
                    debug!(ticker = %ticker, error = %e, "recommendation fetch failed");
                    skipped.push(ticker);
                }
            }
        }

        if !unanswered.is_empty() {
            debug!(count = unanswered.len(), "candidates cut off by the fetch deadline");
        }
        skipped.extend(unanswered);

        if entries.is_empty() {
            return Err(Error::NoData(format!(
                "no recommendation data for any of {} candidates",
                attempted
            )));
        }

        entries.sort_by(rank_order);
        entries.truncate(limit);
        skipped.sort();

        info!(
            ranked = entries.len(),
            skipped = skipped.len(),
            limit,
            top_buy = entries.iter().filter(|e| e.rating == Rating::Buy).count(),
            "recommendations ranked"
        );

        Ok(Ranking { entries, skipped })
    }
}
