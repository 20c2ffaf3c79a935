//! Product records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{MerchantId, Money, ProductId};

/// A product owned by a merchant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub merchant_id: MerchantId,
    pub name: String,
    /// Unit price in cents.
    pub price: Money,
    /// Units available for reservation. Never negative in any
    /// committed state.
    pub stock: u32,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// The fields embedded in order reads.
    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
            stock: self.stock,
            image_url: self.image_url.clone(),
        }
    }
}

/// Product snapshot joined onto order lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub image_url: String,
}
