//! Portfolio-level totals over an enriched holdings listing.

use crate::types::EnrichedHolding;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Portfolio performance summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PortfolioSnapshot {
    /// Total cost basis of all positions
    pub total_cost: Decimal,
    /// Live value of the positions that have a quote
    pub quoted_value: Decimal,
    /// Cost basis of the positions that have a quote
    pub quoted_cost: Decimal,
    /// Unrealized gain/loss over quoted positions
    pub unrealized_gain: Decimal,
    /// Unrealized gain/loss percentage over quoted positions
    pub unrealized_gain_percent: Option<Decimal>,
    /// Number of visible records, pins included
    pub holding_count: usize,
    /// Number of records with at least one share
    pub open_positions: usize,
    /// Number of open positions with a quote attached
    pub quoted_positions: usize,
    pub positions_in_profit: usize,
    pub positions_in_loss: usize,
}

impl PortfolioSnapshot {
    /// Calculate totals from an enriched listing.
    ///
    /// Positions without a quote contribute to `total_cost` only. So do
    /// positions whose quoted value would overflow the running totals.
    pub fn from_holdings(holdings: &[EnrichedHolding]) -> Self {
        let mut snapshot = Self {
            holding_count: holdings.len(),
            ..Self::default()
        };

        for entry in holdings {
            let cost = entry.holding.market_value;
            snapshot.total_cost = snapshot.total_cost.saturating_add(cost);

            if entry.holding.shares == 0 {
                continue;
            }
            snapshot.open_positions += 1;

            let Some(value) = entry.quoted_value() else {
                continue;
            };
            let (Some(quoted_value), Some(quoted_cost)) = (
                snapshot.quoted_value.checked_add(value),
                snapshot.quoted_cost.checked_add(cost),
            ) else {
                continue;
            };
            snapshot.quoted_positions += 1;
            snapshot.quoted_value = quoted_value;
            snapshot.quoted_cost = quoted_cost;

            if value > cost {
                snapshot.positions_in_profit += 1;
            } else if value < cost {
                snapshot.positions_in_loss += 1;
            }
        }

        snapshot.unrealized_gain = snapshot.quoted_value.saturating_sub(snapshot.quoted_cost);
        snapshot.unrealized_gain_percent = if snapshot.quoted_cost > Decimal::ZERO {
            snapshot
                .unrealized_gain
                .checked_div(snapshot.quoted_cost)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        } else {
            None
        };

        snapshot
    }
}
