//! Order lifecycle tests against the in-memory backend.
//!
//! These cover the stock-reservation invariants end to end: atomic
//! creation, restock-on-cancel, restock-on-delete, and the terminal
//! status rules. The same scenarios run against PostgreSQL in
//! `postgres_integration.rs`.

use chrono::Utc;
use common::{CustomerId, MerchantId, Money, OrderId, OrderItemId, ProductId};
use domain::{Customer, CustomerOrderFilter, NewOrder, NewOrderItem, OrderError, OrderStatus, Product};
use store::{InMemoryOrderStore, OrderStore, StoreError};

const CUSTOMER_ID: i64 = 71;

async fn seed_product(
    store: &InMemoryOrderStore,
    merchant_id: MerchantId,
    stock: u32,
    price_cents: i64,
) -> ProductId {
    let product_id = ProductId::new();
    store
        .create_product(Product {
            id: product_id,
            merchant_id,
            name: "Widget".to_string(),
            price: Money::from_cents(price_cents),
            stock,
            image_url: String::new(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    product_id
}

async fn seed_customer(store: &InMemoryOrderStore, id: i64) {
    store
        .create_customer(Customer {
            id: CustomerId::new(id),
            name: "Alice".to_string(),
            address: "1 Main St".to_string(),
            phone: "555-0100".to_string(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

fn order_for(merchant_id: MerchantId) -> NewOrder {
    NewOrder {
        id: OrderId::new(),
        merchant_id,
        customer_id: CustomerId::new(CUSTOMER_ID),
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

async fn stock_of(store: &InMemoryOrderStore, merchant_id: MerchantId, id: ProductId) -> u32 {
    store.get_product(merchant_id, id).await.unwrap().stock
}

fn order_error(err: StoreError) -> OrderError {
    err.as_order_error().cloned().expect("expected a domain error")
}

#[tokio::test]
async fn concurrent_orders_cannot_oversell() {
    let store = InMemoryOrderStore::new();
    let merchant_id = MerchantId::new();
    let product_id = seed_product(&store, merchant_id, 5, 1000).await;
    seed_customer(&store, CUSTOMER_ID).await;

    let a = store.clone();
    let b = store.clone();
    let (first, second) = tokio::join!(
        a.create_order(order_for(merchant_id), vec![line(product_id, 3)]),
        b.create_order(order_for(merchant_id), vec![line(product_id, 3)]),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one of two 3-unit orders must win");

    let loser = if first.is_err() { first } else { second };
    assert!(matches!(
        order_error(loser.unwrap_err()),
        OrderError::InsufficientStock {
            requested: 3,
            available: 2,
            ..
        }
    ));

    assert_eq!(stock_of(&store, merchant_id, product_id).await, 2);
}

#[tokio::test]
async fn failed_creation_leaves_no_trace() {
    let store = InMemoryOrderStore::new();
    let merchant_id = MerchantId::new();
    let plenty = seed_product(&store, merchant_id, 10, 500).await;
    let scarce = seed_product(&store, merchant_id, 1, 500).await;
    seed_customer(&store, CUSTOMER_ID).await;

    let err = store
        .create_order(
            order_for(merchant_id),
            vec![line(plenty, 2), line(scarce, 5)],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        order_error(err),
        OrderError::InsufficientStock { requested: 5, available: 1, .. }
    ));

    // No order row, no stock movement.
    assert_eq!(store.order_count().await, 0);
    assert_eq!(stock_of(&store, merchant_id, plenty).await, 10);
    assert_eq!(stock_of(&store, merchant_id, scarce).await, 1);
}

#[tokio::test]
async fn unknown_customer_aborts_creation() {
    let store = InMemoryOrderStore::new();
    let merchant_id = MerchantId::new();
    let product_id = seed_product(&store, merchant_id, 4, 250).await;

    let err = store
        .create_order(order_for(merchant_id), vec![line(product_id, 2)])
        .await
        .unwrap_err();
    assert!(matches!(
        order_error(err),
        OrderError::CustomerNotFound(id) if id.as_i64() == CUSTOMER_ID
    ));
    assert_eq!(stock_of(&store, merchant_id, product_id).await, 4);
}

#[tokio::test]
async fn foreign_merchant_product_is_not_found() {
    let store = InMemoryOrderStore::new();
    let owner = MerchantId::new();
    let intruder = MerchantId::new();
    let product_id = seed_product(&store, owner, 8, 100).await;
    seed_customer(&store, CUSTOMER_ID).await;

    let err = store
        .create_order(order_for(intruder), vec![line(product_id, 1)])
        .await
        .unwrap_err();
    assert!(matches!(order_error(err), OrderError::ProductsNotFound));
    assert_eq!(stock_of(&store, owner, product_id).await, 8);
}

#[tokio::test]
async fn cancel_restocks_exactly_once() {
    let store = InMemoryOrderStore::new();
    let merchant_id = MerchantId::new();
    let product_id = seed_product(&store, merchant_id, 5, 300).await;
    seed_customer(&store, CUSTOMER_ID).await;

    let order = store
        .create_order(order_for(merchant_id), vec![line(product_id, 2)])
        .await
        .unwrap();
    assert_eq!(stock_of(&store, merchant_id, product_id).await, 3);

    store
        .update_order_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(stock_of(&store, merchant_id, product_id).await, 5);
    let cancelled = store.get_order(merchant_id, order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let err = store
        .update_order_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(order_error(err), OrderError::AlreadyCancelled));
    assert_eq!(stock_of(&store, merchant_id, product_id).await, 5);
}

#[tokio::test]
async fn confirmed_order_still_restocks_on_cancel() {
    let store = InMemoryOrderStore::new();
    let merchant_id = MerchantId::new();
    let product_id = seed_product(&store, merchant_id, 6, 300).await;
    seed_customer(&store, CUSTOMER_ID).await;

    let order = store
        .create_order(order_for(merchant_id), vec![line(product_id, 4)])
        .await
        .unwrap();
    store
        .update_order_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(stock_of(&store, merchant_id, product_id).await, 2);

    store
        .update_order_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(stock_of(&store, merchant_id, product_id).await, 6);
}

#[tokio::test]
async fn confirmed_never_reverts_to_pending() {
    let store = InMemoryOrderStore::new();
    let merchant_id = MerchantId::new();
    let product_id = seed_product(&store, merchant_id, 3, 300).await;
    seed_customer(&store, CUSTOMER_ID).await;

    let order = store
        .create_order(order_for(merchant_id), vec![line(product_id, 1)])
        .await
        .unwrap();
    store
        .update_order_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap();

    let err = store
        .update_order_status(order.id, OrderStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(
        order_error(err),
        OrderError::InvalidTransition {
            from: OrderStatus::Confirmed,
            to: OrderStatus::Pending,
        }
    ));
    let order = store.get_order(merchant_id, order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn same_status_update_is_a_no_op() {
    let store = InMemoryOrderStore::new();
    let merchant_id = MerchantId::new();
    let product_id = seed_product(&store, merchant_id, 3, 300).await;
    seed_customer(&store, CUSTOMER_ID).await;

    let order = store
        .create_order(order_for(merchant_id), vec![line(product_id, 1)])
        .await
        .unwrap();
    store
        .update_order_status(order.id, OrderStatus::Pending)
        .await
        .unwrap();

    let order = store.get_order(merchant_id, order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(stock_of(&store, merchant_id, product_id).await, 2);
}

#[tokio::test]
async fn delete_pending_restocks_once() {
    let store = InMemoryOrderStore::new();
    let merchant_id = MerchantId::new();
    let product_id = seed_product(&store, merchant_id, 5, 300).await;
    seed_customer(&store, CUSTOMER_ID).await;

    let order = store
        .create_order(order_for(merchant_id), vec![line(product_id, 2)])
        .await
        .unwrap();
    store.delete_order(order.id).await.unwrap();

    assert_eq!(stock_of(&store, merchant_id, product_id).await, 5);
    let err = store.get_order(merchant_id, order.id).await.unwrap_err();
    assert!(matches!(order_error(err), OrderError::OrderNotFound(_)));
}

#[tokio::test]
async fn cancel_then_delete_does_not_restock_twice() {
    let store = InMemoryOrderStore::new();
    let merchant_id = MerchantId::new();
    let product_id = seed_product(&store, merchant_id, 5, 300).await;
    seed_customer(&store, CUSTOMER_ID).await;

    let order = store
        .create_order(order_for(merchant_id), vec![line(product_id, 2)])
        .await
        .unwrap();
    store
        .update_order_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(stock_of(&store, merchant_id, product_id).await, 5);

    store.delete_order(order.id).await.unwrap();
    assert_eq!(stock_of(&store, merchant_id, product_id).await, 5);
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn delete_confirmed_is_rejected() {
    let store = InMemoryOrderStore::new();
    let merchant_id = MerchantId::new();
    let product_id = seed_product(&store, merchant_id, 5, 300).await;
    seed_customer(&store, CUSTOMER_ID).await;

    let order = store
        .create_order(order_for(merchant_id), vec![line(product_id, 2)])
        .await
        .unwrap();
    store
        .update_order_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap();

    let err = store.delete_order(order.id).await.unwrap_err();
    assert!(matches!(order_error(err), OrderError::CannotDeleteConfirmed));

    // Order and items are untouched.
    let order = store.get_order(merchant_id, order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.items.len(), 1);
    assert_eq!(stock_of(&store, merchant_id, product_id).await, 3);
}

#[tokio::test]
async fn validation_rejects_before_any_state_change() {
    let store = InMemoryOrderStore::new();
    let merchant_id = MerchantId::new();
    let product_id = seed_product(&store, merchant_id, 5, 300).await;
    seed_customer(&store, CUSTOMER_ID).await;

    let err = store
        .create_order(order_for(merchant_id), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(order_error(err), OrderError::EmptyOrder));

    let err = store
        .create_order(order_for(merchant_id), vec![line(product_id, 0)])
        .await
        .unwrap_err();
    assert!(matches!(order_error(err), OrderError::ZeroQuantity(id) if id == product_id));

    assert_eq!(stock_of(&store, merchant_id, product_id).await, 5);
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn duplicate_lines_are_checked_against_summed_quantity() {
    let store = InMemoryOrderStore::new();
    let merchant_id = MerchantId::new();
    let product_id = seed_product(&store, merchant_id, 5, 100).await;
    seed_customer(&store, CUSTOMER_ID).await;

    let err = store
        .create_order(
            order_for(merchant_id),
            vec![line(product_id, 3), line(product_id, 3)],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        order_error(err),
        OrderError::InsufficientStock { requested: 6, available: 5, .. }
    ));
    assert_eq!(stock_of(&store, merchant_id, product_id).await, 5);

    let order = store
        .create_order(
            order_for(merchant_id),
            vec![line(product_id, 2), line(product_id, 3)],
        )
        .await
        .unwrap();
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.total_price.cents(), 500);
    assert_eq!(stock_of(&store, merchant_id, product_id).await, 0);
}

#[tokio::test]
async fn customer_listing_spans_merchants() {
    let store = InMemoryOrderStore::new();
    let first_merchant = MerchantId::new();
    let second_merchant = MerchantId::new();
    let first_product = seed_product(&store, first_merchant, 5, 100).await;
    let second_product = seed_product(&store, second_merchant, 5, 100).await;
    seed_customer(&store, CUSTOMER_ID).await;

    store
        .create_order(order_for(first_merchant), vec![line(first_product, 1)])
        .await
        .unwrap();
    store
        .create_order(order_for(second_merchant), vec![line(second_product, 1)])
        .await
        .unwrap();

    let all = store
        .list_orders_for_customer(CustomerOrderFilter::for_customer(CustomerId::new(
            CUSTOMER_ID,
        )))
        .await
        .unwrap();
    assert_eq!(all.total, 2);

    let scoped = store
        .list_orders_for_customer(
            CustomerOrderFilter::for_customer(CustomerId::new(CUSTOMER_ID))
                .merchant(first_merchant),
        )
        .await
        .unwrap();
    assert_eq!(scoped.total, 1);
    assert_eq!(scoped.orders[0].merchant_id, first_merchant);
}
