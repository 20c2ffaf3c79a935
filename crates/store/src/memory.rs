use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use common::{CustomerId, MerchantId, Money, OrderId, ProductId};
use domain::{
    Customer, CustomerOrderFilter, NewOrder, NewOrderItem, Order, OrderError, OrderFilter,
    OrderItem, OrderPage, OrderStatus, Product, StatusChange,
};

use crate::{OrderStore, Result};

/// In-memory order store with the same observable semantics as the
/// PostgreSQL implementation.
///
/// One mutex stands in for the database transaction: every operation
/// sees and leaves a consistent snapshot, so the lifecycle tests run
/// unchanged against both backends. All state checks happen before any
/// mutation, which gives the same all-or-nothing behavior a rollback
/// would.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    products: HashMap<ProductId, Product>,
    customers: HashMap<CustomerId, Customer>,
    orders: HashMap<OrderId, Order>,
}

impl State {
    fn filtered_page(
        &self,
        matches: impl Fn(&Order) -> bool,
        page: domain::Pagination,
    ) -> OrderPage {
        let mut orders: Vec<&Order> = self.orders.values().filter(|o| matches(o)).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = orders.len() as u64;
        let orders = orders
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|order| self.with_joins(order))
            .collect();

        OrderPage {
            orders,
            total,
            page: page.page,
            per_page: page.per_page,
        }
    }

    /// Attaches the customer record and product snapshots, as the SQL
    /// read paths do with joins.
    fn with_joins(&self, order: &Order) -> Order {
        let mut order = order.clone();
        order.customer = self.customers.get(&order.customer_id).cloned();
        for item in &mut order.items {
            item.product = self.products.get(&item.product_id).map(Product::summary);
        }
        order
    }
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order> {
        domain::validate_items(&items)?;
        let requested = domain::quantities_by_product(&items);

        let mut state = self.state.lock().await;

        for (product_id, &quantity) in &requested {
            let Some(product) = state
                .products
                .get(product_id)
                .filter(|p| p.merchant_id == order.merchant_id)
            else {
                return Err(OrderError::ProductsNotFound.into());
            };
            if quantity > product.stock {
                return Err(OrderError::InsufficientStock {
                    product_id: *product_id,
                    requested: quantity,
                    available: product.stock,
                }
                .into());
            }
        }

        if !state.customers.contains_key(&order.customer_id) {
            return Err(OrderError::CustomerNotFound(order.customer_id).into());
        }

        // Everything is validated while the lock is held; from here the
        // operation cannot fail, so mutations stay all-or-nothing.
        let created_at = Utc::now();
        let mut total_price = Money::zero();
        let mut stored_items = Vec::with_capacity(items.len());
        for item in &items {
            let unit_price = state
                .products
                .get(&item.product_id)
                .map(|p| p.price)
                .ok_or(OrderError::ProductsNotFound)?;
            let line_total = unit_price * item.quantity;
            total_price += line_total;
            stored_items.push(OrderItem {
                id: item.id,
                order_id: order.id,
                product_id: item.product_id,
                quantity: item.quantity,
                total_price: line_total,
                created_at,
                product: None,
            });
        }

        for (product_id, &quantity) in &requested {
            if let Some(product) = state.products.get_mut(product_id) {
                product.stock = product.stock.saturating_sub(quantity);
            }
        }

        let stored = Order {
            id: order.id,
            merchant_id: order.merchant_id,
            customer_id: order.customer_id,
            total_price,
            status: OrderStatus::Pending,
            order_date: order.order_date,
            created_at,
            items: stored_items,
            customer: None,
        };
        state.orders.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_order(&self, merchant_id: MerchantId, order_id: OrderId) -> Result<Order> {
        let state = self.state.lock().await;
        let Some(order) = state
            .orders
            .get(&order_id)
            .filter(|o| o.merchant_id == merchant_id)
        else {
            return Err(OrderError::OrderNotFound(order_id).into());
        };
        Ok(state.with_joins(order))
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<OrderPage> {
        let state = self.state.lock().await;
        Ok(state.filtered_page(
            |order| {
                order.merchant_id == filter.merchant_id
                    && filter
                        .customer_id
                        .is_none_or(|customer_id| order.customer_id == customer_id)
                    && filter.status.is_none_or(|status| order.status == status)
            },
            filter.page,
        ))
    }

    async fn list_orders_for_customer(&self, filter: CustomerOrderFilter) -> Result<OrderPage> {
        let state = self.state.lock().await;
        Ok(state.filtered_page(
            |order| {
                order.customer_id == filter.customer_id
                    && filter
                        .merchant_id
                        .is_none_or(|merchant_id| order.merchant_id == merchant_id)
                    && filter.status.is_none_or(|status| order.status == status)
            },
            filter.page,
        ))
    }

    async fn update_order_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<()> {
        let mut state = self.state.lock().await;

        let (change, returned) = {
            let order = state
                .orders
                .get(&order_id)
                .ok_or(OrderError::OrderNotFound(order_id))?;
            (
                order.status.transition_to(new_status)?,
                domain::restock_quantities(&order.items),
            )
        };

        if let StatusChange::Apply { restock } = change {
            if restock {
                for (product_id, quantity) in returned {
                    if let Some(product) = state.products.get_mut(&product_id) {
                        product.stock += quantity;
                    }
                }
            }
            if let Some(order) = state.orders.get_mut(&order_id) {
                order.status = new_status;
            }
        }
        Ok(())
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        let mut state = self.state.lock().await;

        let (status, returned) = {
            let order = state
                .orders
                .get(&order_id)
                .ok_or(OrderError::OrderNotFound(order_id))?;
            (order.status, domain::restock_quantities(&order.items))
        };

        if !status.is_deletable() {
            return Err(OrderError::CannotDeleteConfirmed.into());
        }
        if status.holds_reservation() {
            for (product_id, quantity) in returned {
                if let Some(product) = state.products.get_mut(&product_id) {
                    product.stock += quantity;
                }
            }
        }
        state.orders.remove(&order_id);
        Ok(())
    }

    async fn get_customer(&self, customer_id: CustomerId) -> Result<Customer> {
        let state = self.state.lock().await;
        state
            .customers
            .get(&customer_id)
            .cloned()
            .ok_or_else(|| OrderError::CustomerNotFound(customer_id).into())
    }

    async fn create_customer(&self, customer: Customer) -> Result<()> {
        let mut state = self.state.lock().await;
        state.customers.insert(customer.id, customer);
        Ok(())
    }

    async fn create_product(&self, product: Product) -> Result<()> {
        let mut state = self.state.lock().await;
        state.products.insert(product.id, product);
        Ok(())
    }

    async fn get_product(&self, merchant_id: MerchantId, product_id: ProductId) -> Result<Product> {
        let state = self.state.lock().await;
        state
            .products
            .get(&product_id)
            .filter(|p| p.merchant_id == merchant_id)
            .cloned()
            .ok_or_else(|| OrderError::ProductNotFound(product_id).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderItemId;

    fn merchant() -> MerchantId {
        MerchantId::new()
    }

    async fn seed(store: &InMemoryOrderStore, merchant_id: MerchantId, stock: u32) -> ProductId {
        let product_id = ProductId::new();
        store
            .create_product(Product {
                id: product_id,
                merchant_id,
                name: "Widget".to_string(),
                price: Money::from_cents(1500),
                stock,
                image_url: String::new(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .create_customer(Customer {
                id: CustomerId::new(1),
                name: "Alice".to_string(),
                address: "1 Main St".to_string(),
                phone: "555-0100".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        product_id
    }

    fn new_order(merchant_id: MerchantId) -> NewOrder {
        NewOrder {
            id: OrderId::new(),
            merchant_id,
            customer_id: CustomerId::new(1),
            order_date: Utc::now(),
        }
    }

    fn line(product_id: ProductId, quantity: u32) -> NewOrderItem {
        NewOrderItem {
            id: OrderItemId::new(),
            product_id,
            quantity,
        }
    }

    #[tokio::test]
    async fn create_snapshots_prices_and_decrements_stock() {
        let store = InMemoryOrderStore::new();
        let merchant_id = merchant();
        let product_id = seed(&store, merchant_id, 10).await;

        let order = store
            .create_order(new_order(merchant_id), vec![line(product_id, 3)])
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_price.cents(), 4500);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].total_price.cents(), 4500);

        let product = store.get_product(merchant_id, product_id).await.unwrap();
        assert_eq!(product.stock, 7);
    }

    #[tokio::test]
    async fn get_order_is_merchant_scoped() {
        let store = InMemoryOrderStore::new();
        let merchant_id = merchant();
        let product_id = seed(&store, merchant_id, 5).await;

        let order = store
            .create_order(new_order(merchant_id), vec![line(product_id, 1)])
            .await
            .unwrap();

        let err = store.get_order(merchant(), order.id).await.unwrap_err();
        assert!(matches!(
            err.as_order_error(),
            Some(OrderError::OrderNotFound(_))
        ));

        let found = store.get_order(merchant_id, order.id).await.unwrap();
        assert!(found.customer.is_some());
        assert!(found.items[0].product.is_some());
    }

    #[tokio::test]
    async fn list_orders_paginates_newest_first() {
        let store = InMemoryOrderStore::new();
        let merchant_id = merchant();
        let product_id = seed(&store, merchant_id, 100).await;

        let mut ids = Vec::new();
        for _ in 0..5 {
            let order = store
                .create_order(new_order(merchant_id), vec![line(product_id, 1)])
                .await
                .unwrap();
            ids.push(order.id);
        }

        let page = store
            .list_orders(
                OrderFilter::for_merchant(merchant_id).page(domain::Pagination::new(2, 2)),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.orders.len(), 2);
        assert_eq!(page.total_pages(), 3);
        // Newest first: page 2 of size 2 holds the 3rd and 4th newest.
        assert_eq!(page.orders[0].id, ids[2]);
        assert_eq!(page.orders[1].id, ids[1]);
    }

    #[tokio::test]
    async fn status_filter_applies() {
        let store = InMemoryOrderStore::new();
        let merchant_id = merchant();
        let product_id = seed(&store, merchant_id, 100).await;

        let first = store
            .create_order(new_order(merchant_id), vec![line(product_id, 1)])
            .await
            .unwrap();
        store
            .create_order(new_order(merchant_id), vec![line(product_id, 1)])
            .await
            .unwrap();
        store
            .update_order_status(first.id, OrderStatus::Confirmed)
            .await
            .unwrap();

        let confirmed = store
            .list_orders(
                OrderFilter::for_merchant(merchant_id).status(OrderStatus::Confirmed),
            )
            .await
            .unwrap();
        assert_eq!(confirmed.total, 1);
        assert_eq!(confirmed.orders[0].id, first.id);
    }
}
