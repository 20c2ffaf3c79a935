//! Order status state machine.

use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// Lifecycle status of an order.
///
/// Transitions:
/// ```text
/// pending ──┬──► confirmed ──► cancelled
///           └────────────────► cancelled
/// ```
/// `confirmed` never reverts to `pending`, and `cancelled` is
/// terminal. Every transition into `cancelled` returns the stock
/// reserved at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Stock is reserved; the order awaits the merchant's decision.
    #[default]
    Pending,

    /// The merchant accepted the order.
    Confirmed,

    /// The order was cancelled and its stock returned (terminal).
    Cancelled,
}

/// Outcome of a legal status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// The order already has the requested status; nothing to write.
    Unchanged,

    /// Write the new status. `restock` is true when the transition
    /// releases the stock reserved at creation.
    Apply {
        /// Whether reserved quantities go back onto their products.
        restock: bool,
    },
}

impl OrderStatus {
    /// Decides whether an order in this status may move to `next`.
    ///
    /// Same-status updates for `pending` and `confirmed` are accepted
    /// as no-ops; re-cancelling is an error of its own so callers can
    /// distinguish it from other illegal moves.
    pub fn transition_to(self, next: OrderStatus) -> Result<StatusChange, OrderError> {
        match (self, next) {
            (OrderStatus::Pending, OrderStatus::Pending)
            | (OrderStatus::Confirmed, OrderStatus::Confirmed) => Ok(StatusChange::Unchanged),
            (OrderStatus::Pending, OrderStatus::Confirmed) => {
                Ok(StatusChange::Apply { restock: false })
            }
            (OrderStatus::Pending, OrderStatus::Cancelled)
            | (OrderStatus::Confirmed, OrderStatus::Cancelled) => {
                Ok(StatusChange::Apply { restock: true })
            }
            (OrderStatus::Cancelled, OrderStatus::Cancelled) => Err(OrderError::AlreadyCancelled),
            (OrderStatus::Confirmed, OrderStatus::Pending)
            | (OrderStatus::Cancelled, OrderStatus::Pending)
            | (OrderStatus::Cancelled, OrderStatus::Confirmed) => {
                Err(OrderError::InvalidTransition {
                    from: self,
                    to: next,
                })
            }
        }
    }

    /// Returns true if an order in this status may be deleted.
    pub fn is_deletable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Cancelled)
    }

    /// Returns true when deleting an order in this status must return
    /// its reserved stock first.
    pub fn holds_reservation(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}
