//! SQLite-backed store for orders, line items, and derived participants.
//!
//! Single shared connection behind an async mutex; every operation locks
//! the handle, runs one transaction, and releases. No `.await` happens
//! while a transaction is open, so transactions never straddle suspension
//! points.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// RFC 3339 UTC timestamp, second precision. Stored as TEXT; same-format
/// strings order lexicographically, which the recency queries rely on.
pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Clone)]
pub struct LedgerDb {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl LedgerDb {
    /// Open (or create) the ledger database at the given path.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("open ledger db at {}", db_path))?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("enable foreign keys")?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory ledger db")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("enable foreign keys")?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS orders (
                order_id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                vendor TEXT NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                creator_id TEXT NOT NULL,
                payer_id TEXT NOT NULL,
                discount_type TEXT NOT NULL DEFAULT 'none',
                discount_value REAL NOT NULL DEFAULT 0,
                adjustment INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'open'
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS line_items (
                item_id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                unit_price INTEGER NOT NULL,
                qty INTEGER NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                created_by TEXT NOT NULL,
                FOREIGN KEY (order_id) REFERENCES orders(order_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS participants (
                order_id INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                total_due INTEGER NOT NULL DEFAULT 0,
                paid INTEGER NOT NULL DEFAULT 0,
                paid_at TEXT,
                paid_to TEXT,
                PRIMARY KEY (order_id, user_id),
                FOREIGN KEY (order_id) REFERENCES orders(order_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_line_items_order_user
             ON line_items(order_id, user_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_participants_user
             ON participants(user_id, paid)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_orders_creator
             ON orders(creator_id)",
            [],
        )?;

        Ok(())
    }

    /// Acquire the shared connection. Mutations take a transaction on the
    /// guard; plain reads query it directly.
    pub(crate) async fn acquire(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
