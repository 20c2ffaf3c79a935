//! Typed error taxonomy for order operations.

use thiserror::Error;

use common::{CustomerId, OrderId, ProductId};

use crate::status::OrderStatus;

/// Broad classification of an [`OrderError`], used by callers to pick
/// a response strategy. All members are recoverable by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The addressed entity does not exist or is not visible to the
    /// caller.
    NotFound,

    /// The operation conflicts with current state (stock levels,
    /// order status).
    Conflict,

    /// The request was structurally invalid; rejected before any
    /// transaction opened.
    Validation,
}

/// Errors produced by order operations.
///
/// Callers branch on [`OrderError::kind`], never on message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The order does not exist or belongs to another merchant.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// The referenced customer does not exist.
    #[error("customer {0} not found")]
    CustomerNotFound(CustomerId),

    /// The product does not exist or belongs to another merchant.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// At least one requested product does not exist or belongs to a
    /// different merchant. The two cases are indistinguishable to the
    /// caller so merchants cannot probe each other's catalogs.
    #[error("one or more products not found")]
    ProductsNotFound,

    /// The requested quantity exceeds the available stock.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The guarded stock decrement touched zero rows; a concurrent
    /// order consumed the stock first.
    #[error("stock for product {0} was taken by a concurrent order")]
    ConcurrentStockConflict(ProductId),

    /// The requested status change is not legal from the current
    /// status.
    #[error("cannot change order status from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The order was already cancelled.
    #[error("order is already cancelled")]
    AlreadyCancelled,

    /// Confirmed orders cannot be deleted.
    #[error("cannot delete a confirmed order")]
    CannotDeleteConfirmed,

    /// An order needs at least one item.
    #[error("order must contain at least one item")]
    EmptyOrder,

    /// Item quantities must be at least 1.
    #[error("quantity for product {0} must be at least 1")]
    ZeroQuantity(ProductId),

    /// A status string did not name a known status.
    #[error("unknown order status {0:?}")]
    UnknownStatus(String),
}

impl OrderError {
    /// Classifies the error for response mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::OrderNotFound(_)
            | OrderError::CustomerNotFound(_)
            | OrderError::ProductNotFound(_)
            | OrderError::ProductsNotFound => ErrorKind::NotFound,
            OrderError::InsufficientStock { .. }
            | OrderError::ConcurrentStockConflict(_)
            | OrderError::InvalidTransition { .. }
            | OrderError::AlreadyCancelled
            | OrderError::CannotDeleteConfirmed => ErrorKind::Conflict,
            OrderError::EmptyOrder | OrderError::ZeroQuantity(_) | OrderError::UnknownStatus(_) => {
                ErrorKind::Validation
            }
        }
    }
}
