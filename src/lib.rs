//! SplitLedger - Shared-Expense Ledger Core
//!
//! Exposes the ledger recalculation engine and its store for use by
//! front ends and tests. Command parsing, display-name resolution, and
//! message formatting live in the consuming front end, not here.

pub mod ledger;
pub mod models;

// Re-export the main entry points at crate root for convenience
pub use ledger::{LedgerDb, LedgerError};
