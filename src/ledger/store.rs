//! Row-level accessors shared by mutations, recomputation, and views.
//!
//! Functions here take a borrowed connection so they compose inside the
//! caller's transaction (`rusqlite::Transaction` derefs to `Connection`).
//! They never commit.

use rusqlite::{params, Connection};

use crate::ledger::error::{LedgerError, LedgerResult};
use crate::models::{
    Amount, DiscountKind, DiscountRule, LineItemRecord, OrderRecord, OrderStatus,
    ParticipantRecord,
};

const ORDER_COLUMNS: &str = "order_id, created_at, vendor, note, creator_id, payer_id, \
     discount_type, discount_value, adjustment, status";

fn row_to_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderRecord> {
    let discount_type: String = row.get(6)?;
    let status: String = row.get(9)?;
    Ok(OrderRecord {
        order_id: row.get(0)?,
        created_at: row.get(1)?,
        vendor: row.get(2)?,
        note: row.get(3)?,
        creator_id: row.get(4)?,
        payer_id: row.get(5)?,
        discount: DiscountRule {
            kind: parse_discount_kind(6, &discount_type)?,
            value: row.get(7)?,
        },
        adjustment: row.get(8)?,
        status: parse_status(9, &status)?,
    })
}

// Unknown enum text means the file was written by something else entirely;
// surface it as a conversion failure rather than guessing a default.
pub(crate) fn parse_status(idx: usize, raw: &str) -> rusqlite::Result<OrderStatus> {
    OrderStatus::from_str(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown order status: {raw}").into(),
        )
    })
}

pub(crate) fn parse_discount_kind(idx: usize, raw: &str) -> rusqlite::Result<DiscountKind> {
    DiscountKind::from_str(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown discount kind: {raw}").into(),
        )
    })
}

fn row_to_participant(row: &rusqlite::Row<'_>) -> rusqlite::Result<ParticipantRecord> {
    Ok(ParticipantRecord {
        order_id: row.get(0)?,
        user_id: row.get(1)?,
        total_due: row.get(2)?,
        paid: row.get(3)?,
        paid_at: row.get(4)?,
        paid_to: row.get(5)?,
    })
}

/// Fetch an order or fail with `OrderNotFound`.
pub(crate) fn get_order(conn: &Connection, order_id: i64) -> LedgerResult<OrderRecord> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1"
    ))?;
    match stmt.query_row(params![order_id], row_to_order) {
        Ok(order) => Ok(order),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(LedgerError::OrderNotFound { order_id }),
        Err(e) => Err(e.into()),
    }
}

/// Per-user subtotal over the order's line items.
pub(crate) fn subtotals_by_user(
    conn: &Connection,
    order_id: i64,
) -> LedgerResult<Vec<(String, Amount)>> {
    let mut stmt = conn.prepare_cached(
        "SELECT user_id, SUM(unit_price * qty) AS subtotal
         FROM line_items
         WHERE order_id = ?1
         GROUP BY user_id",
    )?;
    let rows = stmt
        .query_map(params![order_id], |row| {
            let user_id: String = row.get(0)?;
            let subtotal: Amount = row.get(1)?;
            Ok((user_id, subtotal))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// All line items of an order, grouped for display: by owner, then
/// insertion order.
pub(crate) fn items_for_order(
    conn: &Connection,
    order_id: i64,
) -> LedgerResult<Vec<LineItemRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT item_id, order_id, user_id, name, unit_price, qty, note, created_at, created_by
         FROM line_items
         WHERE order_id = ?1
         ORDER BY user_id, item_id",
    )?;
    let rows = stmt
        .query_map(params![order_id], |row| {
            Ok(LineItemRecord {
                item_id: row.get(0)?,
                order_id: row.get(1)?,
                user_id: row.get(2)?,
                name: row.get(3)?,
                unit_price: row.get(4)?,
                qty: row.get(5)?,
                note: row.get(6)?,
                created_at: row.get(7)?,
                created_by: row.get(8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn get_participant(
    conn: &Connection,
    order_id: i64,
    user_id: &str,
) -> LedgerResult<Option<ParticipantRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT order_id, user_id, total_due, paid, paid_at, paid_to
         FROM participants
         WHERE order_id = ?1 AND user_id = ?2",
    )?;
    match stmt.query_row(params![order_id, user_id], row_to_participant) {
        Ok(p) => Ok(Some(p)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Derived rows for an order, ordered by user id for determinism.
pub(crate) fn participants_for_order(
    conn: &Connection,
    order_id: i64,
) -> LedgerResult<Vec<ParticipantRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT order_id, user_id, total_due, paid, paid_at, paid_to
         FROM participants
         WHERE order_id = ?1
         ORDER BY user_id",
    )?;
    let rows = stmt
        .query_map(params![order_id], row_to_participant)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Upsert one derived row. The insert arm seeds the payment fields to
/// their defaults; the update arm touches `total_due` only, which is what
/// keeps `paid` / `paid_at` / `paid_to` sticky across recomputation.
pub(crate) fn upsert_participant_total(
    conn: &Connection,
    order_id: i64,
    user_id: &str,
    total_due: Amount,
) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO participants (order_id, user_id, total_due, paid, paid_at, paid_to)
         VALUES (?1, ?2, ?3, 0, NULL, NULL)
         ON CONFLICT(order_id, user_id)
         DO UPDATE SET total_due = excluded.total_due",
        params![order_id, user_id, total_due],
    )?;
    Ok(())
}

/// Delete derived rows whose user no longer owns any line item in the
/// order. Items are append-only today, so this normally deletes nothing,
/// but the row-presence invariant is enforced on every pass regardless.
pub(crate) fn purge_orphan_participants(conn: &Connection, order_id: i64) -> LedgerResult<usize> {
    let purged = conn.execute(
        "DELETE FROM participants
         WHERE order_id = ?1
           AND user_id NOT IN (
             SELECT DISTINCT user_id FROM line_items WHERE order_id = ?1
           )",
        params![order_id],
    )?;
    Ok(purged)
}
