//! Recomputation engine: derives participant rows from line items.
//!
//! The computation itself is pure (`discount_subtotal` / `total_due`);
//! `recalc_order` applies it to the store inside the caller's transaction.
//! The pass is idempotent: re-running it with no intervening mutation
//! rewrites every row to the value it already holds and purges nothing.

use rusqlite::Connection;
use tracing::debug;

use crate::ledger::error::LedgerResult;
use crate::ledger::store;
use crate::models::{Amount, DiscountKind, DiscountRule, OrderStatus};

/// Apply the order's discount rule to one participant subtotal.
///
/// Percent uses round-half-to-even; half-up would drift on .5 boundaries.
/// The fixed-amount kind is stored but deliberately not applied: the
/// allocation rule is an open product question (see DESIGN.md).
pub fn discount_subtotal(subtotal: Amount, rule: &DiscountRule) -> Amount {
    match rule.kind {
        DiscountKind::None => subtotal,
        DiscountKind::Percent => (subtotal as f64 * rule.value).round_ties_even() as Amount,
        DiscountKind::Amount => subtotal,
    }
}

/// Final amount due: discounted subtotal plus the flat per-person
/// adjustment, clamped at zero.
pub fn total_due(subtotal: Amount, rule: &DiscountRule, adjustment: Amount) -> Amount {
    (discount_subtotal(subtotal, rule) + adjustment).max(0)
}

/// Recompute the authoritative participant set for one order.
///
/// Runs inside the caller's transaction. A cancelled order is frozen:
/// the pass returns without touching any row, which is a deliberate
/// no-op rather than an error.
pub(crate) fn recalc_order(conn: &Connection, order_id: i64) -> LedgerResult<()> {
    let order = store::get_order(conn, order_id)?;

    if order.status == OrderStatus::Cancelled {
        debug!(order_id, "skipping recalc for cancelled order");
        return Ok(());
    }

    let subtotals = store::subtotals_by_user(conn, order_id)?;

    for (user_id, subtotal) in &subtotals {
        let due = total_due(*subtotal, &order.discount, order.adjustment);
        store::upsert_participant_total(conn, order_id, user_id, due)?;
    }

    let purged = store::purge_orphan_participants(conn, order_id)?;
    if purged > 0 {
        debug!(order_id, purged, "purged participants with no items");
    }

    Ok(())
}
