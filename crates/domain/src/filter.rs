//! Listing filters and pagination.

use serde::Serialize;

use common::{CustomerId, MerchantId};

use crate::order::Order;
use crate::status::OrderStatus;

/// 1-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    /// Page size used when the caller does not specify one.
    pub const DEFAULT_PER_PAGE: u32 = 10;

    /// Creates a pagination, clamping page and page size to at
    /// least 1.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Number of rows skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    /// Maximum number of rows on this page.
    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }
}

/// Merchant-facing order listing filter.
///
/// The merchant id is mandatory: the authorization boundary sits in
/// the data layer, not only in the handler.
#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub merchant_id: MerchantId,
    pub customer_id: Option<CustomerId>,
    pub status: Option<OrderStatus>,
    pub page: Pagination,
}

impl OrderFilter {
    /// Creates an unfiltered listing of a merchant's orders.
    pub fn for_merchant(merchant_id: MerchantId) -> Self {
        Self {
            merchant_id,
            customer_id: None,
            status: None,
            page: Pagination::default(),
        }
    }

    /// Restricts the listing to a single customer.
    pub fn customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    /// Restricts the listing to a single status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Selects a page.
    pub fn page(mut self, page: Pagination) -> Self {
        self.page = page;
        self
    }
}

/// Customer-facing order listing filter; merchant scope is optional
/// here because the customer only ever sees their own orders.
#[derive(Debug, Clone)]
pub struct CustomerOrderFilter {
    pub customer_id: CustomerId,
    pub merchant_id: Option<MerchantId>,
    pub status: Option<OrderStatus>,
    pub page: Pagination,
}

impl CustomerOrderFilter {
    /// Creates an unfiltered listing of a customer's orders.
    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            merchant_id: None,
            status: None,
            page: Pagination::default(),
        }
    }

    /// Restricts the listing to a single merchant.
    pub fn merchant(mut self, merchant_id: MerchantId) -> Self {
        self.merchant_id = Some(merchant_id);
        self
    }

    /// Restricts the listing to a single status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Selects a page.
    pub fn page(mut self, page: Pagination) -> Self {
        self.page = page;
        self
    }
}

/// One page of orders plus the total row count for the filter.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl OrderPage {
    /// Total number of pages for the filter.
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.per_page.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_zero_based_from_one_based_pages() {
        assert_eq!(Pagination::new(1, 10).offset(), 0);
        assert_eq!(Pagination::new(2, 10).offset(), 10);
        assert_eq!(Pagination::new(3, 25).offset(), 50);
    }

    #[test]
    fn page_and_per_page_clamp_to_one() {
        let page = Pagination::new(0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 1);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn default_page_size() {
        let page = Pagination::default();
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, Pagination::DEFAULT_PER_PAGE);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = |total| OrderPage {
            orders: Vec::new(),
            total,
            page: 1,
            per_page: 10,
        };
        assert_eq!(page(0).total_pages(), 0);
        assert_eq!(page(1).total_pages(), 1);
        assert_eq!(page(10).total_pages(), 1);
        assert_eq!(page(11).total_pages(), 2);
    }

    #[test]
    fn filter_builders_set_fields() {
        let merchant_id = MerchantId::new();
        let customer_id = CustomerId::new(9);
        let filter = OrderFilter::for_merchant(merchant_id)
            .customer(customer_id)
            .status(OrderStatus::Pending)
            .page(Pagination::new(2, 5));

        assert_eq!(filter.merchant_id, merchant_id);
        assert_eq!(filter.customer_id, Some(customer_id));
        assert_eq!(filter.status, Some(OrderStatus::Pending));
        assert_eq!(filter.page.offset(), 5);
    }
}
