//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::MerchantId;
use uuid::Uuid;

use crate::error::ApiError;

/// Authenticated merchant identity.
///
/// Authentication is handled upstream; the gateway verifies the
/// session and injects the merchant id as the `x-merchant-id` header.
/// Requests without a parseable header are rejected before any handler
/// runs.
#[derive(Debug, Clone, Copy)]
pub struct Merchant(pub MerchantId);

impl<S> FromRequestParts<S> for Merchant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-merchant-id")
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let id = Uuid::parse_str(header).map_err(|_| ApiError::Unauthorized)?;
        Ok(Merchant(MerchantId::from_uuid(id)))
    }
}
