//! Product record endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{Money, ProductId};
use domain::{Product, ProductSummary};
use store::OrderStore;

use crate::error::ApiError;
use crate::extract::Merchant;
use crate::routes::orders::AppState;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price_cents: i64,
    pub stock: u32,
    pub image_url: Option<String>,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub stock: u32,
    pub image_url: String,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        ProductResponse {
            id: product.id.to_string(),
            name: product.name,
            price_cents: product.price.cents(),
            stock: product.stock,
            image_url: product.image_url,
        }
    }
}

impl From<ProductSummary> for ProductResponse {
    fn from(product: ProductSummary) -> Self {
        ProductResponse {
            id: product.id.to_string(),
            name: product.name,
            price_cents: product.price.cents(),
            stock: product.stock,
            image_url: product.image_url,
        }
    }
}

/// POST /products — register a product for the merchant.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Merchant(merchant_id): Merchant,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    if req.price_cents < 0 {
        return Err(ApiError::BadRequest("price must not be negative".to_string()));
    }

    let product = Product {
        id: ProductId::new(),
        merchant_id,
        name: req.name,
        price: Money::from_cents(req.price_cents),
        stock: req.stock,
        image_url: req.image_url.unwrap_or_default(),
        created_at: Utc::now(),
    };
    state.store.create_product(product.clone()).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /products/:id — fetch one of the merchant's products.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Merchant(merchant_id): Merchant,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .store
        .get_product(merchant_id, ProductId::from_uuid(id))
        .await?;
    Ok(Json(product.into()))
}
