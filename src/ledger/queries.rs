//! Read-side views: single-order bill, per-user debt, personal overview,
//! and the order picker listings.
//!
//! The bill view re-runs recomputation before reading so a caller always
//! sees totals derived from the current line items. The aggregate views
//! read derived rows directly: every mutation path recomputed inside its
//! own transaction, so those rows cannot be stale.

use std::collections::HashMap;

use rusqlite::{params, Connection};

use crate::ledger::db::LedgerDb;
use crate::ledger::error::LedgerResult;
use crate::ledger::{recalc, store};
use crate::models::{
    Amount, BillItem, BillParticipant, BillView, CreatedOrderSummary, DebtEntry, DebtView,
    DiscountRule, OrderSummary, OverviewView, ParticipationSummary,
};

const SUMMARY_COLUMNS: &str = "order_id, vendor, created_at, status, creator_id, payer_id, \
     discount_type, discount_value";

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderSummary> {
    let status: String = row.get(3)?;
    let discount_type: String = row.get(6)?;
    Ok(OrderSummary {
        order_id: row.get(0)?,
        vendor: row.get(1)?,
        created_at: row.get(2)?,
        status: store::parse_status(3, &status)?,
        creator_id: row.get(4)?,
        payer_id: row.get(5)?,
        discount: DiscountRule {
            kind: store::parse_discount_kind(6, &discount_type)?,
            value: row.get(7)?,
        },
    })
}

fn row_to_participation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ParticipationSummary> {
    let status: String = row.get(3)?;
    Ok(ParticipationSummary {
        order_id: row.get(0)?,
        vendor: row.get(1)?,
        created_at: row.get(2)?,
        status: store::parse_status(3, &status)?,
        payer_id: row.get(4)?,
        total_due: row.get(5)?,
        paid_at: row.get(6)?,
    })
}

impl LedgerDb {
    /// Full bill for one order: metadata plus, per participant, the
    /// independently recomputed subtotal, amount due, payment state, and
    /// that user's items. Participants are ordered by user id.
    pub async fn get_bill(&self, order_id: i64) -> LedgerResult<BillView> {
        let mut conn = self.acquire().await;
        let tx = conn.transaction()?;

        // Recalc resolves the order first, so an absent id surfaces as
        // OrderNotFound before any read
        recalc::recalc_order(&tx, order_id)?;

        let order = store::get_order(&tx, order_id)?;
        let items = store::items_for_order(&tx, order_id)?;
        let parts = store::participants_for_order(&tx, order_id)?;
        tx.commit()?;

        let mut items_by_user: HashMap<String, Vec<BillItem>> = HashMap::new();
        for item in items {
            items_by_user
                .entry(item.user_id.clone())
                .or_default()
                .push(BillItem {
                    line_total: item.line_total(),
                    name: item.name,
                    unit_price: item.unit_price,
                    qty: item.qty,
                    note: item.note,
                });
        }

        // Display subtotal is recomputed from the item list rather than
        // read back from the ledger; the two must agree.
        let subtotals: HashMap<String, Amount> = items_by_user
            .iter()
            .map(|(uid, its)| (uid.clone(), its.iter().map(|i| i.line_total).sum()))
            .collect();

        let participants = parts
            .into_iter()
            .map(|p| BillParticipant {
                subtotal: subtotals.get(&p.user_id).copied().unwrap_or(0),
                items: items_by_user.remove(&p.user_id).unwrap_or_default(),
                user_id: p.user_id,
                total_due: p.total_due,
                paid: p.paid,
                paid_at: p.paid_at,
                paid_to: p.paid_to,
            })
            .collect();

        Ok(BillView {
            order,
            participants,
        })
    }

    /// Outstanding debt for one user: total plus itemized lines across
    /// unpaid participations in non-cancelled orders, newest order first.
    /// A user with nothing outstanding gets an empty, zero-total view.
    pub async fn get_user_debt(&self, user_id: &str) -> LedgerResult<DebtView> {
        let conn = self.acquire().await;
        let mut stmt = conn.prepare_cached(
            "SELECT o.order_id, o.vendor, o.created_at, o.payer_id, p.total_due
             FROM participants p
             JOIN orders o ON o.order_id = p.order_id
             WHERE p.user_id = ?1
               AND o.status != 'cancelled'
               AND p.paid = 0
             ORDER BY o.created_at DESC, o.order_id DESC",
        )?;
        let details = stmt
            .query_map(params![user_id], |row| {
                Ok(DebtEntry {
                    order_id: row.get(0)?,
                    vendor: row.get(1)?,
                    created_at: row.get(2)?,
                    payer_id: row.get(3)?,
                    amount: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let total_debt = details.iter().map(|d| d.amount).sum();

        Ok(DebtView {
            user_id: user_id.to_string(),
            total_debt,
            details,
        })
    }

    /// Personal dashboard: unpaid participations, recently paid ones, and
    /// orders the user created, each bounded by `limit` and excluding
    /// cancelled orders.
    pub async fn get_user_overview(&self, user_id: &str, limit: usize) -> LedgerResult<OverviewView> {
        let limit = limit.clamp(1, 100) as i64;
        let conn = self.acquire().await;

        let unpaid = query_participations(
            &conn,
            "SELECT o.order_id, o.vendor, o.created_at, o.status, o.payer_id,
                    p.total_due, p.paid_at
             FROM participants p
             JOIN orders o ON o.order_id = p.order_id
             WHERE p.user_id = ?1
               AND o.status != 'cancelled'
               AND p.paid = 0
             ORDER BY o.created_at DESC, o.order_id DESC
             LIMIT ?2",
            user_id,
            limit,
        )?;

        let paid_recent = query_participations(
            &conn,
            "SELECT o.order_id, o.vendor, o.created_at, o.status, o.payer_id,
                    p.total_due, p.paid_at
             FROM participants p
             JOIN orders o ON o.order_id = p.order_id
             WHERE p.user_id = ?1
               AND o.status != 'cancelled'
               AND p.paid = 1
             ORDER BY p.paid_at DESC, o.created_at DESC, o.order_id DESC
             LIMIT ?2",
            user_id,
            limit,
        )?;

        let mut stmt = conn.prepare_cached(
            "SELECT o.order_id, o.vendor, o.created_at, o.status, o.payer_id,
                    o.discount_type, o.discount_value,
                    (SELECT COUNT(DISTINCT li.user_id)
                       FROM line_items li
                      WHERE li.order_id = o.order_id) AS people_count,
                    (SELECT COALESCE(SUM(p.total_due), 0)
                       FROM participants p
                      WHERE p.order_id = o.order_id) AS total_after_discount
             FROM orders o
             WHERE o.creator_id = ?1
               AND o.status != 'cancelled'
             ORDER BY o.created_at DESC, o.order_id DESC
             LIMIT ?2",
        )?;
        let my_orders = stmt
            .query_map(params![user_id, limit], |row| {
                let status: String = row.get(3)?;
                let discount_type: String = row.get(5)?;
                Ok(CreatedOrderSummary {
                    order_id: row.get(0)?,
                    vendor: row.get(1)?,
                    created_at: row.get(2)?,
                    status: store::parse_status(3, &status)?,
                    payer_id: row.get(4)?,
                    discount: DiscountRule {
                        kind: store::parse_discount_kind(5, &discount_type)?,
                        value: row.get(6)?,
                    },
                    people_count: row.get(7)?,
                    total_after_discount: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(OverviewView {
            user_id: user_id.to_string(),
            unpaid,
            paid_recent,
            my_orders,
        })
    }

    /// Most recent non-cancelled orders, for the picker dropdown.
    pub async fn list_orders_for_picker(&self, limit: usize) -> LedgerResult<Vec<OrderSummary>> {
        let limit = limit.clamp(1, 100) as i64;
        let conn = self.acquire().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SUMMARY_COLUMNS}
             FROM orders
             WHERE status != 'cancelled'
             ORDER BY order_id DESC
             LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit], row_to_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Keyword-filtered picker listing: matches the order id rendered as
    /// text, or a vendor substring.
    pub async fn search_orders_for_picker(
        &self,
        keyword: &str,
        limit: usize,
    ) -> LedgerResult<Vec<OrderSummary>> {
        let limit = limit.clamp(1, 100) as i64;
        let kw = format!("%{}%", keyword.trim());
        let conn = self.acquire().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SUMMARY_COLUMNS}
             FROM orders
             WHERE status != 'cancelled'
               AND (CAST(order_id AS TEXT) LIKE ?1 OR vendor LIKE ?1)
             ORDER BY order_id DESC
             LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![kw, limit], row_to_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn query_participations(
    conn: &Connection,
    sql: &str,
    user_id: &str,
    limit: i64,
) -> LedgerResult<Vec<ParticipationSummary>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(params![user_id, limit], row_to_participation)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
