//! Customer record endpoints and customer-facing order listing.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{CustomerId, MerchantId};
use domain::{Customer, CustomerOrderFilter};
use store::OrderStore;

use crate::error::ApiError;
use crate::routes::orders::{AppState, OrderListResponse, page_response, pagination_from, parse_status};

#[derive(Deserialize)]
pub struct CreateCustomerRequest {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub phone: String,
}

#[derive(Serialize)]
pub struct CustomerResponse {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub phone: String,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        CustomerResponse {
            id: customer.id.as_i64(),
            name: customer.name,
            address: customer.address,
            phone: customer.phone,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CustomerOrdersQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub merchant_id: Option<Uuid>,
    pub status: Option<String>,
}

/// POST /customers — register a customer record.
///
/// The id is assigned by the upstream system that knows the customer,
/// not minted here.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<CustomerResponse>), ApiError> {
    let customer = Customer {
        id: CustomerId::new(req.id),
        name: req.name,
        address: req.address,
        phone: req.phone,
        created_at: Utc::now(),
    };
    state.store.create_customer(customer.clone()).await?;
    Ok((StatusCode::CREATED, Json(customer.into())))
}

/// GET /customers/:id — fetch a customer record.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let customer = state.store.get_customer(CustomerId::new(id)).await?;
    Ok(Json(customer.into()))
}

/// GET /customers/:id/orders — list a customer's orders, optionally
/// scoped to one merchant.
#[tracing::instrument(skip(state))]
pub async fn orders<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Query(query): Query<CustomerOrdersQuery>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let mut filter = CustomerOrderFilter::for_customer(CustomerId::new(id))
        .page(pagination_from(query.page, query.per_page));
    if let Some(merchant_id) = query.merchant_id {
        filter = filter.merchant(MerchantId::from_uuid(merchant_id));
    }
    if let Some(ref status) = query.status {
        filter = filter.status(parse_status(status)?);
    }

    let page = state.store.list_orders_for_customer(filter).await?;
    Ok(Json(page_response(page)))
}
