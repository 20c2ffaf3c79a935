//! Order records and creation inputs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{CustomerId, MerchantId, Money, OrderId, OrderItemId, ProductId};

use crate::customer::Customer;
use crate::error::OrderError;
use crate::product::ProductSummary;
use crate::status::OrderStatus;

/// A persisted order together with its line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub merchant_id: MerchantId,
    pub customer_id: CustomerId,
    /// Derived from locked product prices at creation; never
    /// client-supplied.
    pub total_price: Money,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
    /// Joined customer record, present on read paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
}

/// A single order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price at order time times quantity, snapshotted at
    /// creation. Later price changes do not touch committed orders.
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
    /// The product as it looks now, present on read paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
}

/// Header of an order about to be created.
///
/// All ids are minted by the caller; the storage engine never
/// generates identifiers.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub merchant_id: MerchantId,
    pub customer_id: CustomerId,
    pub order_date: DateTime<Utc>,
}

/// One requested line of a new order.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Rejects structurally invalid item lists.
///
/// Runs before any transaction opens: an empty order or a zero
/// quantity never reaches the database.
pub fn validate_items(items: &[NewOrderItem]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::EmptyOrder);
    }
    for item in items {
        if item.quantity == 0 {
            return Err(OrderError::ZeroQuantity(item.product_id));
        }
    }
    Ok(())
}

/// Sums requested quantities per product.
///
/// A request may name the same product on several lines; availability
/// is checked against the combined quantity, not per line.
pub fn quantities_by_product(items: &[NewOrderItem]) -> HashMap<ProductId, u32> {
    let mut requested: HashMap<ProductId, u32> = HashMap::new();
    for item in items {
        *requested.entry(item.product_id).or_insert(0) += item.quantity;
    }
    requested
}

/// Sums reserved quantities per product for restocking.
pub fn restock_quantities(items: &[OrderItem]) -> HashMap<ProductId, u32> {
    let mut returned: HashMap<ProductId, u32> = HashMap::new();
    for item in items {
        *returned.entry(item.product_id).or_insert(0) += item.quantity;
    }
    returned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: ProductId, quantity: u32) -> NewOrderItem {
        NewOrderItem {
            id: OrderItemId::new(),
            product_id,
            quantity,
        }
    }

    #[test]
    fn empty_item_list_is_rejected() {
        assert_eq!(validate_items(&[]), Err(OrderError::EmptyOrder));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let product_id = ProductId::new();
        let items = vec![item(ProductId::new(), 2), item(product_id, 0)];
        assert_eq!(
            validate_items(&items),
            Err(OrderError::ZeroQuantity(product_id))
        );
    }

    #[test]
    fn valid_items_pass() {
        let items = vec![item(ProductId::new(), 1)];
        assert_eq!(validate_items(&items), Ok(()));
    }

    #[test]
    fn duplicate_product_lines_are_summed() {
        let product_id = ProductId::new();
        let other = ProductId::new();
        let items = vec![item(product_id, 2), item(other, 1), item(product_id, 3)];

        let requested = quantities_by_product(&items);
        assert_eq!(requested.len(), 2);
        assert_eq!(requested.get(&product_id), Some(&5));
        assert_eq!(requested.get(&other), Some(&1));
    }

    #[test]
    fn restock_sums_per_product() {
        let order_id = OrderId::new();
        let product_id = ProductId::new();
        let now = Utc::now();
        let line = |quantity| OrderItem {
            id: OrderItemId::new(),
            order_id,
            product_id,
            quantity,
            total_price: Money::from_cents(100) * quantity,
            created_at: now,
            product: None,
        };

        let returned = restock_quantities(&[line(2), line(3)]);
        assert_eq!(returned.get(&product_id), Some(&5));
    }
}
