//! Customer records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::CustomerId;

/// A customer referenced by orders.
///
/// Customers are registered by an upstream system and must exist
/// before an order referencing them commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}
