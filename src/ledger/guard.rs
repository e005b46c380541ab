//! Lifecycle guard: gates every order mutation by status and actor.
//!
//! Status machine: `open` -> `locked` (lock) -> `open` (unlock), and
//! `open`/`locked` -> `cancelled` (terminal). All checks are pure over an
//! already-fetched `OrderRecord`, so they run inside the caller's
//! transaction with no extra reads.

use crate::ledger::error::{LedgerError, LedgerResult};
use crate::models::{OrderRecord, OrderStatus};

/// Subtotal-affecting mutations (add item, set discount, set adjustment)
/// are only allowed while the order is open.
pub(crate) fn ensure_editable(order: &OrderRecord) -> LedgerResult<()> {
    match order.status {
        OrderStatus::Open => Ok(()),
        _ => Err(LedgerError::OrderNotEditable {
            order_id: order.order_id,
            status: order.status,
        }),
    }
}

/// Lifecycle transitions are creator-only. Plain equality against the
/// stored creator identity; there is no delegation model.
pub(crate) fn ensure_creator(order: &OrderRecord, actor_id: &str) -> LedgerResult<()> {
    if order.creator_id != actor_id {
        return Err(LedgerError::NotAuthorized {
            order_id: order.order_id,
            actor_id: actor_id.to_string(),
        });
    }
    Ok(())
}

/// Lock is only meaningful from `open`. Re-locking is reported as a
/// redundant transition so the caller can tell it apart from a
/// cancellation conflict.
pub(crate) fn check_lock(order: &OrderRecord, actor_id: &str) -> LedgerResult<()> {
    if order.status == OrderStatus::Cancelled {
        return Err(LedgerError::AlreadyCancelled {
            order_id: order.order_id,
        });
    }
    ensure_creator(order, actor_id)?;
    if order.status == OrderStatus::Locked {
        return Err(LedgerError::InvalidTransition {
            order_id: order.order_id,
            from: OrderStatus::Locked,
            to: OrderStatus::Locked,
        });
    }
    Ok(())
}

/// Unlock resets any non-cancelled order to `open`. Unlocking an order
/// that is already open is accepted as a no-op reset.
pub(crate) fn check_unlock(order: &OrderRecord, actor_id: &str) -> LedgerResult<()> {
    if order.status == OrderStatus::Cancelled {
        return Err(LedgerError::AlreadyCancelled {
            order_id: order.order_id,
        });
    }
    ensure_creator(order, actor_id)
}

/// Cancel is reachable from `open` or `locked` and is irreversible.
pub(crate) fn check_cancel(order: &OrderRecord, actor_id: &str) -> LedgerResult<()> {
    if order.status == OrderStatus::Cancelled {
        return Err(LedgerError::AlreadyCancelled {
            order_id: order.order_id,
        });
    }
    ensure_creator(order, actor_id)
}
