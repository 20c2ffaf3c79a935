use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use common::{CustomerId, MerchantId, Money, OrderId, OrderItemId, ProductId};
use domain::{
    Customer, CustomerOrderFilter, NewOrder, NewOrderItem, Order, OrderError, OrderFilter,
    OrderItem, OrderPage, OrderStatus, Product, ProductSummary, StatusChange,
};

use crate::{OrderStore, Result};

/// PostgreSQL-backed order store.
///
/// All multi-row writes run inside a single transaction with row-level
/// locks (`SELECT ... FOR UPDATE`) on the touched rows. Early returns
/// and panics roll the transaction back through `Transaction`'s drop
/// guard, so no partial stock mutation is ever observable.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects with a bounded pool so a stuck database cannot hold
    /// request workers indefinitely.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let customer_id = CustomerId::new(row.try_get("customer_id")?);
        let status: OrderStatus = row.try_get::<String, _>("status")?.parse()?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get("id")?),
            merchant_id: MerchantId::from_uuid(row.try_get("merchant_id")?),
            customer_id,
            total_price: Money::from_cents(row.try_get("total_price")?),
            status,
            order_date: row.try_get("order_date")?,
            created_at: row.try_get("created_at")?,
            items: Vec::new(),
            customer: Some(Customer {
                id: customer_id,
                name: row.try_get("customer_name")?,
                address: row.try_get("customer_address")?,
                phone: row.try_get("customer_phone")?,
                created_at: row.try_get("customer_created_at")?,
            }),
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        let product = match row.try_get::<Option<Uuid>, _>("product_row_id")? {
            Some(id) => Some(ProductSummary {
                id: ProductId::from_uuid(id),
                name: row.try_get("product_name")?,
                price: Money::from_cents(row.try_get("product_price")?),
                stock: row.try_get::<i32, _>("product_stock")?.max(0) as u32,
                image_url: row.try_get("product_image_url")?,
            }),
            None => None,
        };

        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.try_get("id")?),
            order_id: OrderId::from_uuid(row.try_get("order_id")?),
            product_id: ProductId::from_uuid(row.try_get("product_id")?),
            quantity: row.try_get::<i32, _>("quantity")?.max(0) as u32,
            total_price: Money::from_cents(row.try_get("total_price")?),
            created_at: row.try_get("created_at")?,
            product,
        })
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.total_price, oi.created_at,
                   p.id AS product_row_id, p.name AS product_name, p.price AS product_price,
                   p.stock AS product_stock, p.image_url AS product_image_url
            FROM order_items oi
            LEFT JOIN products p ON oi.product_id = p.id
            WHERE oi.order_id = $1
            ORDER BY oi.created_at ASC, oi.id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_item).collect()
    }

    fn page_sql(where_clause: &str, limit_param: usize, offset_param: usize) -> String {
        format!(
            r#"
            SELECT o.id, o.merchant_id, o.customer_id, o.total_price, o.status,
                   o.order_date, o.created_at,
                   c.name AS customer_name, c.address AS customer_address,
                   c.phone AS customer_phone, c.created_at AS customer_created_at
            FROM orders o
            JOIN customers c ON o.customer_id = c.id
            WHERE {where_clause}
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT ${limit_param} OFFSET ${offset_param}
            "#
        )
    }

    async fn collect_orders(&self, rows: &[PgRow]) -> Result<Vec<Order>> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let mut order = Self::row_to_order(row)?;
            order.items = self.order_items(order.id).await?;
            orders.push(order);
        }
        Ok(orders)
    }
}

/// Returns every reserved quantity of the order to its product, summed
/// per product first. Runs inside the caller's transaction.
async fn restock_order_items(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
) -> Result<()> {
    let rows = sqlx::query("SELECT product_id, quantity FROM order_items WHERE order_id = $1")
        .bind(order_id.as_uuid())
        .fetch_all(&mut **tx)
        .await?;

    let mut returned: HashMap<Uuid, i32> = HashMap::new();
    for row in rows {
        let product_id: Uuid = row.try_get("product_id")?;
        let quantity: i32 = row.try_get("quantity")?;
        *returned.entry(product_id).or_insert(0) += quantity;
    }

    for (product_id, quantity) in returned {
        sqlx::query("UPDATE products SET stock = stock + $1 WHERE id = $2")
            .bind(quantity)
            .bind(product_id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

/// Locks the order row and returns its current status.
async fn lock_order_status(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
) -> Result<OrderStatus> {
    let row = sqlx::query("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

    let Some(row) = row else {
        return Err(OrderError::OrderNotFound(order_id).into());
    };
    let status: OrderStatus = row.try_get::<String, _>("status")?.parse()?;
    Ok(status)
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, order, items), fields(order_id = %order.id, merchant_id = %order.merchant_id))]
    async fn create_order(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order> {
        domain::validate_items(&items)?;
        let requested = domain::quantities_by_product(&items);
        let product_ids: Vec<Uuid> = requested.keys().map(|id| id.as_uuid()).collect();

        let mut tx = self.pool.begin().await?;

        // Lock every requested product in a single statement so two
        // orders sharing products in different sequences cannot
        // deadlock on partially acquired lock sets.
        let rows = sqlx::query(
            r#"
            SELECT id, stock, price
            FROM products
            WHERE id = ANY($1) AND merchant_id = $2
            FOR UPDATE
            "#,
        )
        .bind(&product_ids)
        .bind(order.merchant_id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;

        // A missing product and another merchant's product are
        // indistinguishable to the caller.
        if rows.len() != product_ids.len() {
            return Err(OrderError::ProductsNotFound.into());
        }

        let mut available: HashMap<ProductId, u32> = HashMap::with_capacity(rows.len());
        let mut unit_prices: HashMap<ProductId, Money> = HashMap::with_capacity(rows.len());
        for row in &rows {
            let id = ProductId::from_uuid(row.try_get("id")?);
            let stock: i32 = row.try_get("stock")?;
            available.insert(id, stock.max(0) as u32);
            unit_prices.insert(id, Money::from_cents(row.try_get("price")?));
        }

        for (product_id, &quantity) in &requested {
            let stock = available.get(product_id).copied().unwrap_or(0);
            if quantity > stock {
                return Err(OrderError::InsufficientStock {
                    product_id: *product_id,
                    requested: quantity,
                    available: stock,
                }
                .into());
            }
        }

        let customer_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM customers WHERE id = $1)")
                .bind(order.customer_id.as_i64())
                .fetch_one(&mut *tx)
                .await?;
        if !customer_exists {
            return Err(OrderError::CustomerNotFound(order.customer_id).into());
        }

        let created_at = Utc::now();
        let mut total_price = Money::zero();
        let mut stored_items = Vec::with_capacity(items.len());
        for item in &items {
            let unit_price = unit_prices
                .get(&item.product_id)
                .copied()
                .ok_or(OrderError::ProductsNotFound)?;
            let line_total = unit_price * item.quantity;
            total_price += line_total;

            // The lock above already serialized access; the guarded
            // decrement is a backstop against isolation weaker than
            // expected.
            let affected =
                sqlx::query("UPDATE products SET stock = stock - $1 WHERE id = $2 AND stock >= $1")
                    .bind(item.quantity as i32)
                    .bind(item.product_id.as_uuid())
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
            if affected == 0 {
                metrics::counter!("orders_stock_conflicts_total").increment(1);
                return Err(OrderError::ConcurrentStockConflict(item.product_id).into());
            }

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

        sqlx::query(
            r#"
            INSERT INTO orders (id, merchant_id, customer_id, total_price, status, order_date, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.merchant_id.as_uuid())
        .bind(order.customer_id.as_i64())
        .bind(total_price.cents())
        .bind(OrderStatus::Pending.as_str())
        .bind(order.order_date)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        for item in &stored_items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, total_price, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(item.quantity as i32)
            .bind(item.total_price.cents())
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        metrics::counter!("orders_created_total").increment(1);

        Ok(Order {
            id: order.id,
            merchant_id: order.merchant_id,
            customer_id: order.customer_id,
            total_price,
            status: OrderStatus::Pending,
            order_date: order.order_date,
            created_at,
            items: stored_items,
            customer: None,
        })
    }

    async fn get_order(&self, merchant_id: MerchantId, order_id: OrderId) -> Result<Order> {
        let row = sqlx::query(
            r#"
            SELECT o.id, o.merchant_id, o.customer_id, o.total_price, o.status,
                   o.order_date, o.created_at,
                   c.name AS customer_name, c.address AS customer_address,
                   c.phone AS customer_phone, c.created_at AS customer_created_at
            FROM orders o
            JOIN customers c ON o.customer_id = c.id
            WHERE o.id = $1 AND o.merchant_id = $2
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(merchant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(OrderError::OrderNotFound(order_id).into());
        };
        let mut order = Self::row_to_order(&row)?;
        order.items = self.order_items(order_id).await?;
        Ok(order)
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<OrderPage> {
        let mut where_clause = String::from("o.merchant_id = $1");
        let mut param_count = 1;
        if filter.customer_id.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND o.customer_id = ${param_count}"));
        }
        if filter.status.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND o.status = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders o WHERE {where_clause}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        count_query = count_query.bind(filter.merchant_id.as_uuid());
        if let Some(customer_id) = filter.customer_id {
            count_query = count_query.bind(customer_id.as_i64());
        }
        if let Some(status) = filter.status {
            count_query = count_query.bind(status.as_str());
        }
        let total = count_query.fetch_one(&self.pool).await?.max(0) as u64;

        let page_sql = Self::page_sql(&where_clause, param_count + 1, param_count + 2);
        let mut page_query = sqlx::query(&page_sql);
        page_query = page_query.bind(filter.merchant_id.as_uuid());
        if let Some(customer_id) = filter.customer_id {
            page_query = page_query.bind(customer_id.as_i64());
        }
        if let Some(status) = filter.status {
            page_query = page_query.bind(status.as_str());
        }
        let rows = page_query
            .bind(filter.page.limit() as i64)
            .bind(filter.page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(OrderPage {
            orders: self.collect_orders(&rows).await?,
            total,
            page: filter.page.page,
            per_page: filter.page.per_page,
        })
    }

    async fn list_orders_for_customer(&self, filter: CustomerOrderFilter) -> Result<OrderPage> {
        let mut where_clause = String::from("o.customer_id = $1");
        let mut param_count = 1;
        if filter.merchant_id.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND o.merchant_id = ${param_count}"));
        }
        if filter.status.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND o.status = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders o WHERE {where_clause}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        count_query = count_query.bind(filter.customer_id.as_i64());
        if let Some(merchant_id) = filter.merchant_id {
            count_query = count_query.bind(merchant_id.as_uuid());
        }
        if let Some(status) = filter.status {
            count_query = count_query.bind(status.as_str());
        }
        let total = count_query.fetch_one(&self.pool).await?.max(0) as u64;

        let page_sql = Self::page_sql(&where_clause, param_count + 1, param_count + 2);
        let mut page_query = sqlx::query(&page_sql);
        page_query = page_query.bind(filter.customer_id.as_i64());
        if let Some(merchant_id) = filter.merchant_id {
            page_query = page_query.bind(merchant_id.as_uuid());
        }
        if let Some(status) = filter.status {
            page_query = page_query.bind(status.as_str());
        }
        let rows = page_query
            .bind(filter.page.limit() as i64)
            .bind(filter.page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(OrderPage {
            orders: self.collect_orders(&rows).await?,
            total,
            page: filter.page.page,
            per_page: filter.page.per_page,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn update_order_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let current = lock_order_status(&mut tx, order_id).await?;
        match current.transition_to(new_status)? {
            StatusChange::Unchanged => {}
            StatusChange::Apply { restock } => {
                sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
                    .bind(new_status.as_str())
                    .bind(order_id.as_uuid())
                    .execute(&mut *tx)
                    .await?;
                if restock {
                    restock_order_items(&mut tx, order_id).await?;
                    metrics::counter!("orders_cancelled_total").increment(1);
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let status = lock_order_status(&mut tx, order_id).await?;
        if !status.is_deletable() {
            return Err(OrderError::CannotDeleteConfirmed.into());
        }
        if status.holds_reservation() {
            // The reservation from creation was never released; return
            // it before the item rows disappear.
            restock_order_items(&mut tx, order_id).await?;
        }

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_customer(&self, customer_id: CustomerId) -> Result<Customer> {
        let row = sqlx::query(
            "SELECT id, name, address, phone, created_at FROM customers WHERE id = $1",
        )
        .bind(customer_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(OrderError::CustomerNotFound(customer_id).into());
        };
        Ok(Customer {
            id: CustomerId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            phone: row.try_get("phone")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn create_customer(&self, customer: Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, address, phone, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(customer.id.as_i64())
        .bind(&customer.name)
        .bind(&customer.address)
        .bind(&customer.phone)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, merchant_id, name, price, stock, image_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.merchant_id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.stock as i32)
        .bind(&product.image_url)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_product(&self, merchant_id: MerchantId, product_id: ProductId) -> Result<Product> {
        let row = sqlx::query(
            r#"
            SELECT id, merchant_id, name, price, stock, image_url, created_at
            FROM products
            WHERE id = $1 AND merchant_id = $2
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(merchant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(OrderError::ProductNotFound(product_id).into());
        };
        Ok(Product {
            id: ProductId::from_uuid(row.try_get("id")?),
            merchant_id: MerchantId::from_uuid(row.try_get("merchant_id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price")?),
            stock: row.try_get::<i32, _>("stock")?.max(0) as u32,
            image_url: row.try_get("image_url")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
