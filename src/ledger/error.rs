//! Typed failures surfaced by ledger operations.
//!
//! Every failure is detected synchronously inside the operation's
//! transaction and surfaced as one of these variants; the front end owns
//! wording and tone, this enum only carries the kind plus enough context
//! to render a message.

use crate::models::OrderStatus;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug)]
pub enum LedgerError {
    /// Referenced order id does not exist.
    OrderNotFound { order_id: i64 },

    /// The target user owns no line items in the order.
    NoSuchParticipant { order_id: i64, user_id: String },

    /// Mutation attempted on a locked or cancelled order.
    OrderNotEditable { order_id: i64, status: OrderStatus },

    /// Actor is not the order's creator for a creator-only operation.
    NotAuthorized { order_id: i64, actor_id: String },

    /// Lifecycle operation on an already-cancelled order.
    AlreadyCancelled { order_id: i64 },

    /// Redundant lifecycle transition (e.g. locking a locked order).
    InvalidTransition {
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Item quantity or unit price out of allowed range.
    InvalidItem { reason: String },

    /// Discount percent outside [0, 1].
    InvalidDiscount { percent: f64 },

    /// Underlying SQLite failure.
    Storage(rusqlite::Error),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::OrderNotFound { order_id } => {
                write!(f, "order #{} not found", order_id)
            }
            LedgerError::NoSuchParticipant { order_id, user_id } => {
                write!(f, "user {} has no items in order #{}", user_id, order_id)
            }
            LedgerError::OrderNotEditable { order_id, status } => {
                write!(
                    f,
                    "order #{} is {} and cannot be modified",
                    order_id,
                    status.as_str()
                )
            }
            LedgerError::NotAuthorized { order_id, actor_id } => {
                write!(
                    f,
                    "user {} is not the creator of order #{}",
                    actor_id, order_id
                )
            }
            LedgerError::AlreadyCancelled { order_id } => {
                write!(f, "order #{} is already cancelled", order_id)
            }
            LedgerError::InvalidTransition { order_id, from, to } => {
                write!(
                    f,
                    "order #{}: invalid transition {} -> {}",
                    order_id,
                    from.as_str(),
                    to.as_str()
                )
            }
            LedgerError::InvalidItem { reason } => write!(f, "invalid item: {}", reason),
            LedgerError::InvalidDiscount { percent } => {
                write!(f, "discount percent {} outside [0, 1]", percent)
            }
            LedgerError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Storage(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = LedgerError::OrderNotEditable {
            order_id: 7,
            status: OrderStatus::Locked,
        };
        assert_eq!(err.to_string(), "order #7 is locked and cannot be modified");

        let err = LedgerError::InvalidTransition {
            order_id: 3,
            from: OrderStatus::Locked,
            to: OrderStatus::Locked,
        };
        assert!(err.to_string().contains("locked -> locked"));
    }

    #[test]
    fn test_storage_error_preserves_source() {
        let err = LedgerError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(std::error::Error::source(&err).is_some());
    }
}
