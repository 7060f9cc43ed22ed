use async_trait::async_trait;
use beans_core::repository::{OrderRepository, RepositoryError};
use beans_core::{LineItem, Order, OrderStatus, ProductSnapshot};
use chrono::{DateTime, FixedOffset, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_ids: &[String]) -> Result<HashMap<String, Vec<LineItem>>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id, name, price, description, image, quantity \
             FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut items: HashMap<String, Vec<LineItem>> = HashMap::new();
        for row in rows {
            let order_id = row.order_id.clone();
            items.entry(order_id).or_default().push(row.into());
        }
        Ok(items)
    }

    async fn hydrate(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut items = self.load_items(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }

    async fn fetch_row(&self, id: &str) -> Result<Option<OrderRow>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(&format!("{} WHERE id = $1", SELECT_ORDERS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)
    }
}

const SELECT_ORDERS: &str =
    "SELECT id, user_id, created_at, created_offset_secs, total, status, payment_token FROM orders";

fn storage(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(err.to_string())
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    user_id: i64,
    created_at: DateTime<Utc>,
    created_offset_secs: i32,
    total: i64,
    status: String,
    payment_token: Option<String>,
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>) -> Result<Order, RepositoryError> {
        let status: OrderStatus = self
            .status
            .parse()
            .map_err(|e| RepositoryError::Storage(format!("order {}: {}", self.id, e)))?;
        let offset = FixedOffset::east_opt(self.created_offset_secs)
            .ok_or_else(|| RepositoryError::Storage(format!("order {}: bad utc offset", self.id)))?;

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            created_at: self.created_at.with_timezone(&offset),
            total: self.total,
            status,
            payment_token: self.payment_token,
            items,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: String,
    product_id: i64,
    name: String,
    price: i64,
    description: String,
    image: String,
    quantity: i32,
}

impl From<OrderItemRow> for LineItem {
    fn from(row: OrderItemRow) -> Self {
        LineItem {
            id: row.id,
            product: ProductSnapshot {
                id: row.product_id,
                name: row.name,
                price: row.price,
                description: row.description,
                image: row.image,
            },
            quantity: row.quantity,
        }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("{} ORDER BY created_at DESC, id DESC", SELECT_ORDERS))
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        self.hydrate(rows).await
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            SELECT_ORDERS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        self.hydrate(rows).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Order, RepositoryError> {
        let row = self
            .fetch_row(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        let mut items = self.load_items(&[row.id.clone()]).await?;
        let lines = items.remove(&row.id).unwrap_or_default();
        row.into_order(lines)
    }

    async fn create(&self, order: &Order) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            "INSERT INTO orders (id, user_id, created_at, created_offset_secs, total, status, payment_token) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&order.id)
        .bind(order.user_id)
        .bind(order.created_at.with_timezone(&Utc))
        .bind(order.created_at.offset().local_minus_utc())
        .bind(order.total)
        .bind(order.status.as_str())
        .bind(order.payment_token.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, position, product_id, name, price, description, image, quantity) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(item.id)
            .bind(&order.id)
            .bind(position as i32)
            .bind(item.product.id)
            .bind(&item.product.name)
            .bind(item.product.price)
            .bind(&item.product.description)
            .bind(&item.product.image)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        Ok(order.clone())
    }

    async fn update_status(
        &self,
        id: &str,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(status.as_str())
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        let order = self.find_by_id(id).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict {
                id: id.to_string(),
                expected,
                current: order.status,
            });
        }
        Ok(order)
    }

    async fn update_payment_token(&self, id: &str, token: &str) -> Result<Order, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET payment_token = $1, updated_at = NOW() \
             WHERE id = $2 AND (payment_token IS NULL OR payment_token = $1)",
        )
        .bind(token)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        let order = self.find_by_id(id).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::TokenConflict(id.to_string()));
        }
        Ok(order)
    }
}
