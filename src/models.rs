//! Shared Data Models
//! Mission: typed records for orders, line items, and derived participants

use serde::{Deserialize, Serialize};

/// Monetary amount in whole currency units.
///
/// The ledger works in a currency with no fractional unit, so amounts are
/// plain integers. Only the discount percentage is fractional, and it is
/// converted back to an integer amount during recomputation.
pub type Amount = i64;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Locked,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Locked => "locked",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(OrderStatus::Open),
            "locked" => Some(OrderStatus::Locked),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// Order-level discount kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    None,
    Percent,
    /// Fixed-amount discount. Stored but currently a no-op during
    /// recomputation: the allocation rule (proportional vs. per-head vs.
    /// payer-only) is an unresolved product question, so applying it here
    /// would guess at semantics. See DESIGN.md.
    Amount,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::None => "none",
            DiscountKind::Percent => "percent",
            DiscountKind::Amount => "amount",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(DiscountKind::None),
            "percent" => Some(DiscountKind::Percent),
            "amount" => Some(DiscountKind::Amount),
            _ => None,
        }
    }
}

/// Order-level pricing rule: a discount kind plus its value.
///
/// For `Percent`, `value` is the retained fraction in `[0, 1]`
/// (0.9 means "pay 90% of subtotal").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountRule {
    pub kind: DiscountKind,
    pub value: f64,
}

impl DiscountRule {
    pub fn none() -> Self {
        Self {
            kind: DiscountKind::None,
            value: 0.0,
        }
    }

    pub fn percent(value: f64) -> Self {
        Self {
            kind: DiscountKind::Percent,
            value,
        }
    }
}

/// A group order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: i64,
    pub created_at: String,
    pub vendor: String,
    pub note: String,
    pub creator_id: String,
    pub payer_id: String,
    pub discount: DiscountRule,
    /// Flat per-person correction, signed. Applied after the discount.
    pub adjustment: Amount,
    pub status: OrderStatus,
}

/// A single line item, owned by one user within one order.
/// Append-only: items are never edited or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemRecord {
    pub item_id: i64,
    pub order_id: i64,
    pub user_id: String,
    pub name: String,
    pub unit_price: Amount,
    pub qty: i64,
    pub note: String,
    pub created_at: String,
    pub created_by: String,
}

impl LineItemRecord {
    pub fn line_total(&self) -> Amount {
        self.unit_price * self.qty
    }
}

/// Derived per-(order, user) row. `total_due` is recomputed from line
/// items on every pass; the payment fields are sticky and only ever set
/// by the mark-paid operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub order_id: i64,
    pub user_id: String,
    pub total_due: Amount,
    pub paid: bool,
    pub paid_at: Option<String>,
    pub paid_to: Option<String>,
}

// =============================================================================
// READ-SIDE VIEWS
// =============================================================================

/// One item line inside a bill, with its precomputed line total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillItem {
    pub name: String,
    pub unit_price: Amount,
    pub qty: i64,
    pub note: String,
    pub line_total: Amount,
}

/// One participant's slice of a bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillParticipant {
    pub user_id: String,
    pub subtotal: Amount,
    pub total_due: Amount,
    pub paid: bool,
    pub paid_at: Option<String>,
    pub paid_to: Option<String>,
    pub items: Vec<BillItem>,
}

/// Full bill for a single order: metadata plus per-participant breakdown,
/// participants ordered by user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillView {
    pub order: OrderRecord,
    pub participants: Vec<BillParticipant>,
}

/// One outstanding debt line in a user's debt view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtEntry {
    pub order_id: i64,
    pub vendor: String,
    pub created_at: String,
    pub payer_id: String,
    pub amount: Amount,
}

/// Aggregate outstanding debt for one user across non-cancelled orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtView {
    pub user_id: String,
    pub total_debt: Amount,
    pub details: Vec<DebtEntry>,
}

/// One participation row in the user overview (unpaid or recently paid).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipationSummary {
    pub order_id: i64,
    pub vendor: String,
    pub created_at: String,
    pub status: OrderStatus,
    pub payer_id: String,
    pub total_due: Amount,
    pub paid_at: Option<String>,
}

/// One order the user created, with aggregate figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedOrderSummary {
    pub order_id: i64,
    pub vendor: String,
    pub created_at: String,
    pub status: OrderStatus,
    pub payer_id: String,
    pub discount: DiscountRule,
    pub people_count: i64,
    pub total_after_discount: Amount,
}

/// Personal dashboard: what I owe, what I recently settled, what I opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewView {
    pub user_id: String,
    pub unpaid: Vec<ParticipationSummary>,
    pub paid_recent: Vec<ParticipationSummary>,
    pub my_orders: Vec<CreatedOrderSummary>,
}

/// Compact order row for picker/autocomplete listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: i64,
    pub vendor: String,
    pub created_at: String,
    pub status: OrderStatus,
    pub creator_id: String,
    pub payer_id: String,
    pub discount: DiscountRule,
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Library configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub picker_limit: usize,
    pub overview_limit: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path = std::env::var("SPLITLEDGER_DB_PATH")
            .unwrap_or_else(|_| "./splitledger.db".to_string());

        let picker_limit = std::env::var("SPLITLEDGER_PICKER_LIMIT")
            .unwrap_or_else(|_| "25".to_string())
            .parse()
            .unwrap_or(25);

        let overview_limit = std::env::var("SPLITLEDGER_OVERVIEW_LIMIT")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        Ok(Self {
            database_path,
            picker_limit,
            overview_limit,
        })
    }
}
