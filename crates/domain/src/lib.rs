//! Domain layer for the commerce backend.
//!
//! Holds the order, product, and customer records, the order status
//! state machine, request validation, listing filters, and the typed
//! error taxonomy. This crate is storage-free; the transactional
//! engine in the `store` crate enforces these rules against a
//! database.

pub mod customer;
pub mod error;
pub mod filter;
pub mod order;
pub mod product;
pub mod status;

pub use customer::Customer;
pub use error::{ErrorKind, OrderError};
pub use filter::{CustomerOrderFilter, OrderFilter, OrderPage, Pagination};
pub use order::{
    NewOrder, NewOrderItem, Order, OrderItem, quantities_by_product, restock_quantities,
    validate_items,
};
pub use product::{Product, ProductSummary};
pub use status::{OrderStatus, StatusChange};
