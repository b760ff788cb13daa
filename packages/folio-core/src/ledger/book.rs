//! The holdings ledger: the only writer of share counts and cost basis.

use super::events::{EventSink, LedgerEvent, LedgerEventKind};
use super::store::{Commit, LedgerStore};
use crate::market::{fetch_each, FetchPolicy, MarketDataGateway};
use crate::types::{normalize_owner, EnrichedHolding, Holding, HoldingKey};
use crate::{Error, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// What a committed mutation left behind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// The record is visible in listings.
    Active,
    /// Zero shares; cost basis retained as history, hidden from listings.
    Closed,
    /// The record was removed from the store.
    Deleted,
}

/// Result of a ledger mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeOutcome {
    /// Record state after the mutation (last state if deleted)
    pub holding: Holding,
    pub disposition: Disposition,
}

/// A computed successor state, not yet committed.
#[derive(Debug, Clone)]
struct Plan {
    next: Option<Holding>,
    outcome: TradeOutcome,
    kind: LedgerEventKind,
}

impl Plan {
    fn write(holding: Holding, disposition: Disposition, kind: LedgerEventKind) -> Self {
        Self {
            next: Some(holding.clone()),
            outcome: TradeOutcome {
                holding,
                disposition,
            },
            kind,
        }
    }

    fn delete(last: Holding, kind: LedgerEventKind) -> Self {
        Self {
            next: None,
            outcome: TradeOutcome {
                holding: last,
                disposition: Disposition::Deleted,
            },
            kind,
        }
    }
}

fn overflow(key: &HoldingKey) -> Error {
    Error::InvalidOperation(format!("trade on {} overflows the position", key))
}

/// Weighted-average cost after buying `qty` more shares at `price`.
fn blended_cost(
    key: &HoldingKey,
    held: &Holding,
    qty: u64,
    price: Decimal,
) -> Result<(u64, Decimal)> {
    let shares = held.shares.checked_add(qty).ok_or_else(|| overflow(key))?;

    let held_cost = held
        .avg_cost
        .checked_mul(Decimal::from(held.shares))
        .ok_or_else(|| overflow(key))?;
    let bought_cost = price
        .checked_mul(Decimal::from(qty))
        .ok_or_else(|| overflow(key))?;
    let avg_cost = held_cost
        .checked_add(bought_cost)
        .and_then(|total| total.checked_div(Decimal::from(shares)))
        .ok_or_else(|| overflow(key))?;

    Ok((shares, avg_cost))
}

fn plan_trade(
    key: &HoldingKey,
    current: Option<&Holding>,
    price: Decimal,
    share_delta: i64,
) -> Result<Plan> {
    let qty = share_delta.unsigned_abs();

    if share_delta < 0 {
        let held = match current.filter(|h| h.is_visible()) {
            Some(held) => held,
            None => {
                return Err(Error::InvalidOperation(format!(
                    "cannot sell unheld position {}",
                    key
                )))
            }
        };
        if qty > held.shares {
            return Err(Error::InsufficientShares {
                ticker: key.ticker.clone(),
                held: held.shares,
                requested: qty,
            });
        }

        let mut next = held.clone();
        next.shares -= qty;
        next.market_value = next.cost_value();

        if next.shares > 0 {
            return Ok(Plan::write(next, Disposition::Active, LedgerEventKind::Sold));
        }
        if next.has_cost_history() {
            next.pinned = false;
            return Ok(Plan::write(next, Disposition::Closed, LedgerEventKind::Closed));
        }
        // Every record holding shares is pinned, so a zero-cost close stays a pin
        return Ok(Plan::write(next, Disposition::Active, LedgerEventKind::Closed));
    }

    let next = match current {
        None => {
            price
                .checked_mul(Decimal::from(qty))
                .ok_or_else(|| overflow(key))?;
            Holding::opened(key, qty, price)
        }
        Some(held) => {
            let (shares, avg_cost) = blended_cost(key, held, qty, price)?;
            let mut next = held.clone();
            // Re-opening from zero shares watches the ticker again.
            if held.shares == 0 {
                next.pinned = true;
            }
            next.shares = shares;
            next.avg_cost = avg_cost;
            next.market_value = next
                .avg_cost
                .checked_mul(Decimal::from(shares))
                .ok_or_else(|| overflow(key))?;
            next
        }
    };

    Ok(Plan::write(next, Disposition::Active, LedgerEventKind::Bought))
}

fn plan_pin(key: &HoldingKey, current: Option<&Holding>) -> Result<Plan> {
    match current {
        Some(held) if held.is_visible() => Err(Error::AlreadyExists(key.to_string())),
        Some(closed) => {
            let mut next = closed.clone();
            next.pinned = true;
            Ok(Plan::write(next, Disposition::Active, LedgerEventKind::Pinned))
        }
        None => Ok(Plan::write(
            Holding::pin_only(key),
            Disposition::Active,
            LedgerEventKind::Pinned,
        )),
    }
}

fn plan_unpin(key: &HoldingKey, current: Option<&Holding>) -> Result<Plan> {
    let held = match current.filter(|h| h.is_visible()) {
        Some(held) => held,
        None => return Err(Error::NotFound(key.to_string())),
    };
    if held.shares > 0 || held.has_cost_history() {
        return Err(Error::ActivePosition(key.to_string()));
    }
    Ok(Plan::delete(held.clone(), LedgerEventKind::Unpinned))
}

/// Applies buys, sells, pins and unpins to per-owner holdings.
///
/// Each mutation is a read-compute-commit cycle against the store, retried
/// on version conflicts, so concurrent writers (in this process or others
/// sharing the store) never lose updates.
#[derive(Debug)]
pub struct HoldingsLedger<S, K> {
    store: S,
    sink: K,
    max_attempts: u32,
    fetch_policy: FetchPolicy,
}

impl<S: LedgerStore, K: EventSink> HoldingsLedger<S, K> {
    /// Create a ledger with default retry and fetch limits.
    pub fn new(store: S, sink: K) -> Self {
        Self {
            store,
            sink,
            max_attempts: 5,
            fetch_policy: FetchPolicy::default(),
        }
    }

    /// Set the number of commit attempts before reporting contention.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the limits used for quote enrichment.
    pub fn with_fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = policy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Buy (`share_delta > 0`) or sell (`share_delta < 0`) shares.
    ///
    /// Buys blend the price into the weighted-average cost:
    /// `(avg_cost * shares + share_delta * price) / (shares + share_delta)`.
    /// Sells never change the cost basis. A sell that reaches zero shares
    /// keeps the record as hidden history when it carries a cost basis.
    pub async fn apply_trade(
        &self,
        owner: &str,
        ticker: &str,
        price: Decimal,
        share_delta: i64,
    ) -> Result<TradeOutcome> {
        let key = HoldingKey::new(owner, ticker)?;

        if share_delta == 0 {
            return Err(Error::InvalidOperation(
                "share delta must be non-zero".to_string(),
            ));
        }
        if price < Decimal::ZERO {
            return Err(Error::InvalidOperation(format!(
                "price must not be negative: {}",
                price
            )));
        }

        let plan = self
            .transact(&key, |current| plan_trade(&key, current, price, share_delta))
            .await?;
        self.notify(&key, &plan, share_delta, Some(price)).await;
        Ok(plan.outcome)
    }

    /// Watch a ticker without holding it.
    pub async fn pin(&self, owner: &str, ticker: &str) -> Result<Holding> {
        let key = HoldingKey::new(owner, ticker)?;
        let plan = self.transact(&key, |current| plan_pin(&key, current)).await?;
        self.notify(&key, &plan, 0, None).await;
        Ok(plan.outcome.holding)
    }

    /// Remove a watch-only record. Records with shares or a cost basis stay.
    pub async fn unpin(&self, owner: &str, ticker: &str) -> Result<Holding> {
        let key = HoldingKey::new(owner, ticker)?;
        let plan = self.transact(&key, |current| plan_unpin(&key, current)).await?;
        self.notify(&key, &plan, 0, None).await;
        Ok(plan.outcome.holding)
    }

    /// Visible holdings of an owner, sorted by ticker.
    pub async fn list_holdings(&self, owner: &str) -> Result<Vec<Holding>> {
        let owner = normalize_owner(owner);
        if owner.is_empty() {
            return Err(Error::InvalidOperation("owner must not be empty".to_string()));
        }

        let mut holdings: Vec<Holding> = self
            .store
            .list(&owner)
            .await?
            .into_iter()
            .filter(Holding::is_visible)
            .collect();
        holdings.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(holdings)
    }

    /// Tickers the owner has pinned, sorted.
    pub async fn pinned_tickers(&self, owner: &str) -> Result<Vec<String>> {
        Ok(self
            .list_holdings(owner)
            .await?
            .into_iter()
            .filter(|h| h.pinned)
            .map(|h| h.ticker)
            .collect())
    }

    /// Visible holdings enriched with the last close and total return.
    ///
    /// A quote that fails or times out leaves that entry's enrichment empty;
    /// the listing itself still succeeds.
    pub async fn list_holdings_with_quotes<G>(
        &self,
        owner: &str,
        gateway: &G,
    ) -> Result<Vec<EnrichedHolding>>
    where
        G: MarketDataGateway + ?Sized,
    {
        let holdings = self.list_holdings(owner).await?;
        let tickers = holdings.iter().map(|h| h.ticker.clone()).collect();

        let mut quotes: HashMap<String, Decimal> = HashMap::new();
        for (ticker, result) in fetch_each(tickers, &self.fetch_policy, |ticker| async move {
            gateway.last_close(&ticker).await
        })
        .await
        {
            match result {
                Ok(quote) => {
                    quotes.insert(ticker, quote);
                }
                Err(e) => debug!(ticker = %ticker, error = %e, "quote unavailable"),
            }
        }

        Ok(holdings
            .into_iter()
            .map(|holding| match quotes.get(&holding.ticker) {
                Some(quote) => EnrichedHolding::with_quote(holding, *quote),
                None => EnrichedHolding::unquoted(holding),
            })
            .collect())
    }

    async fn transact<F>(&self, key: &HoldingKey, plan: F) -> Result<Plan>
    where
        F: Fn(Option<&Holding>) -> Result<Plan>,
    {
        for attempt in 1..=self.max_attempts {
            let current = self.store.get(key).await?;
            let expected = current.as_ref().map(|record| record.version);
            let planned = plan(current.as_ref().map(|record| &record.value))?;

            match self.store.commit(key, expected, planned.next.clone()).await? {
                Commit::Applied => return Ok(planned),
                Commit::Conflict => {
                    debug!(key = %key, attempt, "concurrent update, retrying");
                }
            }
        }

        Err(Error::Unavailable(format!(
            "{} is being modified concurrently",
            key
        )))
    }

    async fn notify(&self, key: &HoldingKey, plan: &Plan, share_delta: i64, price: Option<Decimal>) {
        info!(
            key = %key,
            kind = ?plan.kind,
            disposition = ?plan.outcome.disposition,
            shares = plan.outcome.holding.shares,
            "ledger updated"
        );

        let event = LedgerEvent {
            at: Utc::now(),
            kind: plan.kind,
            owner: key.owner.clone(),
            ticker: key.ticker.clone(),
            share_delta,
            price,
            holding: plan.next.clone(),
        };
        if let Err(e) = self.sink.record(&event).await {
            warn!(key = %key, error = %e, "failed to record ledger event");
        }
    }
}
