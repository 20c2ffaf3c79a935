//! Order endpoints: creation, listing, status transitions, deletion.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{CustomerId, OrderId, OrderItemId, ProductId};
use domain::{
    NewOrder, NewOrderItem, Order, OrderFilter, OrderItem, OrderPage, OrderStatus, Pagination,
};
use store::OrderStore;

use crate::error::ApiError;
use crate::extract::Merchant;
use crate::routes::customers::CustomerResponse;
use crate::routes::products::ProductResponse;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub store: S,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: i64,
    pub items: Vec<CreateOrderItemRequest>,
}

#[derive(Deserialize)]
pub struct CreateOrderItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub customer_id: Option<i64>,
    pub status: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub merchant_id: String,
    pub customer_id: i64,
    pub total_price_cents: i64,
    pub status: String,
    pub order_date: String,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub total_price_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductResponse>,
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        OrderResponse {
            id: order.id.to_string(),
            merchant_id: order.merchant_id.to_string(),
            customer_id: order.customer_id.as_i64(),
            total_price_cents: order.total_price.cents(),
            status: order.status.to_string(),
            order_date: order.order_date.to_rfc3339(),
            created_at: order.created_at.to_rfc3339(),
            items: order.items.into_iter().map(OrderItemResponse::from).collect(),
            customer: order.customer.map(CustomerResponse::from),
        }
    }
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        OrderItemResponse {
            id: item.id.to_string(),
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            total_price_cents: item.total_price.cents(),
            product: item.product.map(ProductResponse::from),
        }
    }
}

pub(crate) fn page_response(page: OrderPage) -> OrderListResponse {
    let total_pages = page.total_pages();
    OrderListResponse {
        orders: page.orders.into_iter().map(OrderResponse::from).collect(),
        total: page.total,
        page: page.page,
        per_page: page.per_page,
        total_pages,
    }
}

pub(crate) fn pagination_from(page: Option<u32>, per_page: Option<u32>) -> Pagination {
    Pagination::new(
        page.unwrap_or(1),
        per_page.unwrap_or(Pagination::DEFAULT_PER_PAGE),
    )
}

pub(crate) fn parse_status(status: &str) -> Result<OrderStatus, ApiError> {
    status
        .parse::<OrderStatus>()
        .map_err(|err| ApiError::BadRequest(err.to_string()))
}

// -- Handlers --

/// POST /orders — reserve stock and create a pending order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Merchant(merchant_id): Merchant,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = NewOrder {
        id: OrderId::new(),
        merchant_id,
        customer_id: CustomerId::new(req.customer_id),
        order_date: Utc::now(),
    };
    let items: Vec<NewOrderItem> = req
        .items
        .iter()
        .map(|item| NewOrderItem {
            id: OrderItemId::new(),
            product_id: ProductId::from_uuid(item.product_id),
            quantity: item.quantity,
        })
        .collect();

    let created = state.store.create_order(order, items).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /orders — list the merchant's orders with optional filters.
#[tracing::instrument(skip(state))]
pub async fn list<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Merchant(merchant_id): Merchant,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let mut filter = OrderFilter::for_merchant(merchant_id)
        .page(pagination_from(query.page, query.per_page));
    if let Some(customer_id) = query.customer_id {
        filter = filter.customer(CustomerId::new(customer_id));
    }
    if let Some(ref status) = query.status {
        filter = filter.status(parse_status(status)?);
    }

    let page = state.store.list_orders(filter).await?;
    Ok(Json(page_response(page)))
}

/// GET /orders/:id — fetch one of the merchant's orders.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Merchant(merchant_id): Merchant,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .store
        .get_order(merchant_id, OrderId::from_uuid(id))
        .await?;
    Ok(Json(order.into()))
}

/// PUT /orders/:id/status — apply a status transition.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Merchant(_merchant_id): Merchant,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<StatusCode, ApiError> {
    let new_status = parse_status(&req.status)?;
    state
        .store
        .update_order_status(OrderId::from_uuid(id), new_status)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /orders/:id — delete a pending or cancelled order.
#[tracing::instrument(skip(state))]
pub async fn remove<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Merchant(_merchant_id): Merchant,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_order(OrderId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
