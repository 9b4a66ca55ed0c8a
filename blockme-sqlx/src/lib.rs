//! Relational persistence for the blockme chain mirror.
//!
//! The mirror is append-only: blocks and transactions are inserted once and
//! never updated in place.
pub mod providers;

pub use providers::ledger::types::{BatchOutcome, Block, Transaction};
pub use providers::ledger::{LedgerStore, PgLedgerStore};
pub use providers::{SqlxCtx, StoreError};

#[cfg(any(test, feature = "mock"))]
pub use providers::ledger::MockLedgerStore;
