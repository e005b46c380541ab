//! Mutation operations: order lifecycle, items, pricing, payments.
//!
//! Every operation acquires the shared connection, runs one transaction
//! (validation, writes, recomputation), and commits. An error at any step
//! drops the transaction, rolling back all of it; nothing partial is ever
//! visible to readers.

use rusqlite::params;
use tracing::info;

use crate::ledger::db::{now_iso, LedgerDb};
use crate::ledger::error::{LedgerError, LedgerResult};
use crate::ledger::{guard, recalc, store};
use crate::models::Amount;

impl LedgerDb {
    /// Open a new order. The payer defaults to the creator.
    pub async fn create_order(
        &self,
        vendor: &str,
        creator_id: &str,
        payer_id: Option<&str>,
        note: &str,
    ) -> LedgerResult<i64> {
        let payer_id = payer_id.unwrap_or(creator_id);

        let conn = self.acquire().await;
        conn.execute(
            "INSERT INTO orders (created_at, vendor, note, creator_id, payer_id,
                                 discount_type, discount_value, adjustment, status)
             VALUES (?1, ?2, ?3, ?4, ?5, 'none', 0, 0, 'open')",
            params![now_iso(), vendor, note, creator_id, payer_id],
        )?;
        let order_id = conn.last_insert_rowid();

        info!("Opened order #{} ({}) by {}", order_id, vendor, creator_id);
        Ok(order_id)
    }

    /// Add a line item for a user and recompute the order.
    /// `created_by` defaults to the item's owner.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_item(
        &self,
        order_id: i64,
        user_id: &str,
        name: &str,
        unit_price: Amount,
        qty: i64,
        note: &str,
        created_by: Option<&str>,
    ) -> LedgerResult<i64> {
        if qty <= 0 {
            return Err(LedgerError::InvalidItem {
                reason: format!("qty must be > 0, got {qty}"),
            });
        }
        if unit_price < 0 {
            return Err(LedgerError::InvalidItem {
                reason: format!("unit_price must be >= 0, got {unit_price}"),
            });
        }
        let created_by = created_by.unwrap_or(user_id);

        let mut conn = self.acquire().await;
        let tx = conn.transaction()?;

        let order = store::get_order(&tx, order_id)?;
        guard::ensure_editable(&order)?;

        tx.execute(
            "INSERT INTO line_items (order_id, user_id, name, unit_price, qty, note,
                                     created_at, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![order_id, user_id, name, unit_price, qty, note, now_iso(), created_by],
        )?;
        let item_id = tx.last_insert_rowid();

        recalc::recalc_order(&tx, order_id)?;
        tx.commit()?;

        info!(
            "Added item #{} ({} x{} @ {}) for {} to order #{}",
            item_id, name, qty, unit_price, user_id, order_id
        );
        Ok(item_id)
    }

    /// Set a percent discount on the whole order (0.9 means "pay 90%")
    /// and recompute.
    pub async fn set_discount_percent(&self, order_id: i64, percent: f64) -> LedgerResult<()> {
        if !(0.0..=1.0).contains(&percent) {
            return Err(LedgerError::InvalidDiscount { percent });
        }

        let mut conn = self.acquire().await;
        let tx = conn.transaction()?;

        let order = store::get_order(&tx, order_id)?;
        guard::ensure_editable(&order)?;

        tx.execute(
            "UPDATE orders SET discount_type = 'percent', discount_value = ?1
             WHERE order_id = ?2",
            params![percent, order_id],
        )?;

        recalc::recalc_order(&tx, order_id)?;
        tx.commit()?;

        info!("Set discount {} on order #{}", percent, order_id);
        Ok(())
    }

    /// Set the flat per-person adjustment (signed, applied after the
    /// discount). Creator-only.
    pub async fn set_adjustment(
        &self,
        order_id: i64,
        adjustment: Amount,
        actor_id: &str,
    ) -> LedgerResult<()> {
        let mut conn = self.acquire().await;
        let tx = conn.transaction()?;

        let order = store::get_order(&tx, order_id)?;
        guard::ensure_editable(&order)?;
        guard::ensure_creator(&order, actor_id)?;

        tx.execute(
            "UPDATE orders SET adjustment = ?1 WHERE order_id = ?2",
            params![adjustment, order_id],
        )?;

        recalc::recalc_order(&tx, order_id)?;
        tx.commit()?;

        info!("Set adjustment {} on order #{}", adjustment, order_id);
        Ok(())
    }

    /// Lock the order: no further items or pricing changes. Creator-only.
    pub async fn lock_order(&self, order_id: i64, actor_id: &str) -> LedgerResult<()> {
        let mut conn = self.acquire().await;
        let tx = conn.transaction()?;

        let order = store::get_order(&tx, order_id)?;
        guard::check_lock(&order, actor_id)?;

        tx.execute(
            "UPDATE orders SET status = 'locked' WHERE order_id = ?1",
            params![order_id],
        )?;
        tx.commit()?;

        info!("Locked order #{}", order_id);
        Ok(())
    }

    /// Reopen a locked order. Creator-only.
    pub async fn unlock_order(&self, order_id: i64, actor_id: &str) -> LedgerResult<()> {
        let mut conn = self.acquire().await;
        let tx = conn.transaction()?;

        let order = store::get_order(&tx, order_id)?;
        guard::check_unlock(&order, actor_id)?;

        tx.execute(
            "UPDATE orders SET status = 'open' WHERE order_id = ?1",
            params![order_id],
        )?;
        tx.commit()?;

        info!("Unlocked order #{}", order_id);
        Ok(())
    }

    /// Cancel the order. Irreversible: the ledger is frozen and the order
    /// drops out of debt and overview queries. Creator-only.
    pub async fn cancel_order(&self, order_id: i64, actor_id: &str) -> LedgerResult<()> {
        let mut conn = self.acquire().await;
        let tx = conn.transaction()?;

        let order = store::get_order(&tx, order_id)?;
        guard::check_cancel(&order, actor_id)?;

        tx.execute(
            "UPDATE orders SET status = 'cancelled' WHERE order_id = ?1",
            params![order_id],
        )?;
        tx.commit()?;

        info!("Cancelled order #{}", order_id);
        Ok(())
    }

    /// Mark a participant as paid. Allowed regardless of lock status:
    /// locking only stops new items and pricing changes, settling up is
    /// always fine. `paid_to` defaults to the order's payer.
    pub async fn mark_paid(
        &self,
        order_id: i64,
        user_id: &str,
        paid_to: Option<&str>,
    ) -> LedgerResult<()> {
        let mut conn = self.acquire().await;
        let tx = conn.transaction()?;

        // Fails with OrderNotFound for an absent order, and materializes
        // participant rows that a direct lookup would otherwise miss.
        recalc::recalc_order(&tx, order_id)?;

        let order = store::get_order(&tx, order_id)?;
        let paid_to = paid_to.unwrap_or(&order.payer_id);

        if store::get_participant(&tx, order_id, user_id)?.is_none() {
            return Err(LedgerError::NoSuchParticipant {
                order_id,
                user_id: user_id.to_string(),
            });
        }

        tx.execute(
            "UPDATE participants SET paid = 1, paid_at = ?1, paid_to = ?2
             WHERE order_id = ?3 AND user_id = ?4",
            params![now_iso(), paid_to, order_id, user_id],
        )?;
        tx.commit()?;

        info!(
            "Marked {} paid on order #{} (paid to {})",
            user_id, order_id, paid_to
        );
        Ok(())
    }

    /// Re-derive participant rows for an order. Safe to call at any time:
    /// the pass is idempotent and a cancelled order is left untouched.
    pub async fn recalc_order(&self, order_id: i64) -> LedgerResult<()> {
        let mut conn = self.acquire().await;
        let tx = conn.transaction()?;
        recalc::recalc_order(&tx, order_id)?;
        tx.commit()?;
        Ok(())
    }
}
