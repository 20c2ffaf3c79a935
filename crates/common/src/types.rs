use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a merchant — the user who owns products and receives
/// orders against them.
///
/// Wraps a UUID to prevent mixing merchant ids up with the other
/// UUID-based identifiers in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerchantId(Uuid);

impl MerchantId {
    /// Creates a new random merchant ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a merchant ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MerchantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MerchantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MerchantId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Unique identifier for an order.
///
/// Orders carry UUIDv7 ids so identifiers sort by creation time. Ids
/// are minted by the caller and passed into the storage engine, never
/// generated inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Mints a new time-ordered order ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates an order ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OrderId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Unique identifier for a single order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderItemId(Uuid);

impl OrderItemId {
    /// Mints a new time-ordered order item ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates an order item ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrderItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

impl ProductId {
    /// Mints a new time-ordered product ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a product ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ProductId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier for a customer record.
///
/// Customer ids are assigned by the upstream system that registers
/// customers (e.g. a chat platform user id) and arrive with the
/// request, so this is a plain integer rather than a UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(i64);

impl CustomerId {
    /// Wraps an externally assigned customer id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw integer id.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CustomerId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_ids_are_unique() {
        let id1 = OrderId::new();
        let id2 = OrderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn order_ids_sort_by_creation_time() {
        let earlier = OrderId::new();
        // UUIDv7 embeds a millisecond timestamp; leave a full tick
        // between the two ids.
        std::thread::sleep(std::time::Duration::from_millis(2));
        let later = OrderId::new();
        assert!(earlier.as_uuid() < later.as_uuid());
    }

    #[test]
    fn merchant_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = MerchantId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn customer_id_wraps_raw_integer() {
        let id = CustomerId::new(42);
        assert_eq!(id.as_i64(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn id_serialization_is_transparent() {
        let id = CustomerId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");

        let order_id = OrderId::new();
        let json = serde_json::to_string(&order_id).unwrap();
        let back: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(order_id, back);
    }
}
