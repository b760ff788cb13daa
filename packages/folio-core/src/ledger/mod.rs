//! Per-owner holdings: storage, mutation rules and the audit trail.

mod book;
mod events;
mod store;

pub use book::{Disposition, HoldingsLedger, TradeOutcome};
pub use events::{EventSink, JsonLinesSink, LedgerEvent, LedgerEventKind, MemorySink, NullSink};
pub use store::{Commit, JsonFileStore, LedgerStore, MemoryStore, Versioned};
