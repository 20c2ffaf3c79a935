use async_trait::async_trait;

use common::{CustomerId, MerchantId, OrderId, ProductId};
use domain::{
    Customer, CustomerOrderFilter, NewOrder, NewOrderItem, Order, OrderFilter, OrderPage,
    OrderStatus, Product,
};

use crate::Result;

/// Transactional storage contract consumed by the HTTP layer.
///
/// Every write operation is atomic: either all of its row changes
/// commit or none do, under concurrent access. Implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Atomically reserves stock and persists an order with its items.
    ///
    /// Rejects structurally invalid input before opening a
    /// transaction, then locks every requested product in one
    /// statement, checks availability against quantities summed per
    /// product, verifies the customer exists, snapshots unit prices
    /// into line totals, decrements stock, and writes the order as
    /// `pending`. Any failure aborts the whole transaction.
    async fn create_order(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order>;

    /// Fetches one order with its customer and items, scoped to the
    /// owning merchant. An order of another merchant is reported as
    /// not found.
    async fn get_order(&self, merchant_id: MerchantId, order_id: OrderId) -> Result<Order>;

    /// Lists a merchant's orders, newest first.
    async fn list_orders(&self, filter: OrderFilter) -> Result<OrderPage>;

    /// Lists a customer's orders across merchants, newest first.
    async fn list_orders_for_customer(&self, filter: CustomerOrderFilter) -> Result<OrderPage>;

    /// Applies a status transition under a lock on the order row.
    ///
    /// Transitions into `cancelled` return reserved quantities to
    /// their products in the same transaction. Same-status updates for
    /// pending and confirmed orders are accepted as no-ops.
    async fn update_order_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<()>;

    /// Deletes a pending or cancelled order.
    ///
    /// A pending order still holds the reservation made at creation,
    /// so its quantities are restocked before the rows are removed.
    /// A cancelled order was already restocked and is removed as-is.
    async fn delete_order(&self, order_id: OrderId) -> Result<()>;

    /// Fetches a customer record.
    async fn get_customer(&self, customer_id: CustomerId) -> Result<Customer>;

    /// Inserts a customer record.
    async fn create_customer(&self, customer: Customer) -> Result<()>;

    /// Inserts a product record.
    async fn create_product(&self, product: Product) -> Result<()>;

    /// Fetches one of the merchant's products.
    async fn get_product(&self, merchant_id: MerchantId, product_id: ProductId) -> Result<Product>;
}
