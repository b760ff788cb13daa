//! Reduce analyst recommendation counts to a single rating.

use crate::types::{Rating, RankedCandidate, RecommendationCounts};

/// Score one ticker's recommendation counts.
///
/// `buy = (strong_buy + buy) / total`, `hold = hold / total` and
/// `sell = (strong_sell + sell) / total`. The rating is the largest share,
/// preferring Buy over Hold over Sell on ties, and the score is that share.
///
/// Returns `None` when any count is missing or the total is zero.
pub fn score_counts(ticker: &str, counts: &RecommendationCounts) -> Option<RankedCandidate> {
    let strong_buy = u64::from(counts.strong_buy?);
    let buy = u64::from(counts.buy?);
    let hold = u64::from(counts.hold?);
    let sell = u64::from(counts.sell?);
    let strong_sell = u64::from(counts.strong_sell?);

    let total = strong_buy + buy + hold + sell + strong_sell;
    if total == 0 {
        return None;
    }

    let total = total as f64;
    let shares = [
        (Rating::Buy, (strong_buy + buy) as f64 / total),
        (Rating::Hold, hold as f64 / total),
        (Rating::Sell, (strong_sell + sell) as f64 / total),
    ];

    // Strictly greater wins, so earlier entries take ties
    let (rating, score) = shares
        .into_iter()
        .fold(shares[0], |best, next| if next.1 > best.1 { next } else { best });

    Some(RankedCandidate {
        ticker: ticker.to_string(),
        rating,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn counts(sb: u32, b: u32, h: u32, s: u32, ss: u32) -> RecommendationCounts {
        RecommendationCounts {
            period: None,
            strong_buy: Some(sb),
            buy: Some(b),
            hold: Some(h),
            sell: Some(s),
            strong_sell: Some(ss),
        }
    }

    #[test]
    fn test_buy_majority() {
        let scored = score_counts("AAPL", &counts(10, 20, 8, 1, 1)).unwrap();
        assert_eq!(scored.rating, Rating::Buy);
        assert_relative_eq!(scored.score, 0.75);
    }

    #[test]
    fn test_sell_majority() {
        let scored = score_counts("XYZ", &counts(0, 1, 1, 3, 5)).unwrap();
        assert_eq!(scored.rating, Rating::Sell);
        assert_relative_eq!(scored.score, 0.8);
    }

    #[test]
    fn test_ties_prefer_buy_then_hold() {
        let scored = score_counts("T1", &counts(1, 1, 2, 1, 1)).unwrap();
        assert_eq!(scored.rating, Rating::Buy);

        let scored = score_counts("T2", &counts(0, 1, 2, 2, 0)).unwrap();
        assert_eq!(scored.rating, Rating::Hold);
        assert_relative_eq!(scored.score, 0.4);
    }

    #[test]
    fn test_zero_total_is_excluded() {
        assert!(score_counts("EMPTY", &counts(0, 0, 0, 0, 0)).is_none());
    }

    #[test]
    fn test_missing_field_is_excluded() {
        let mut partial = counts(5, 5, 5, 5, 5);
        partial.hold = None;
        assert!(score_counts("PART", &partial).is_none());
    }
}
