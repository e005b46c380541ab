//! Participant Ledger Core
//!
//! This module owns everything with non-trivial invariants:
//! 1. The recalculation engine that derives each participant's amount due
//!    from line items plus order-level pricing rules
//! 2. The lifecycle guard gating mutations by order status and actor
//! 3. The store layer (orders / line items / derived participants)
//! 4. Read-side views joining the three relations
//!
//! # Consistency model
//!
//! Derived participant rows are never trusted as a cache. Every mutation
//! that can change a subtotal re-runs the recomputation pass inside its own
//! transaction before commit, and the bill view re-runs it defensively
//! before reading. The pass is idempotent, so caller retries after a
//! transient failure only restate already-correct values.
//!
//! # Frozen orders
//!
//! Cancelling an order freezes its ledger: recomputation becomes a
//! deliberate no-op and the historical rows drop out of all debt and
//! overview queries.

pub mod db;
pub mod error;
pub mod guard;
pub mod queries;
pub mod recalc;
pub mod service;
pub mod store;

pub use db::LedgerDb;
pub use error::{LedgerError, LedgerResult};
pub use recalc::{discount_subtotal, total_due};

#[cfg(test)]
mod invariant_tests;
