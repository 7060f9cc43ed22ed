use async_trait::async_trait;
use beans_core::repository::{CustomerDirectory, ProductCatalog, RepositoryError};
use beans_core::{Customer, ProductSnapshot};
use beans_shared::Masked;
use sqlx::PgPool;

/// Read-only view over the users and products tables.
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    phone: String,
    address: String,
    post_code: String,
}

impl From<UserRow> for Customer {
    fn from(row: UserRow) -> Self {
        Customer {
            id: row.id,
            name: row.name,
            email: Masked(row.email),
            phone: Masked(row.phone),
            address: Masked(row.address),
            post_code: row.post_code,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    price: i64,
    description: String,
    image: String,
}

#[async_trait]
impl CustomerDirectory for PgCatalogRepository {
    async fn find_customer(&self, user_id: i64) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, phone, address, post_code FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(row.map(Customer::from))
    }
}

#[async_trait]
impl ProductCatalog for PgCatalogRepository {
    async fn find_products(&self, ids: &[i64]) -> Result<Vec<ProductSnapshot>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, price, description, image FROM products WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| ProductSnapshot {
                id: r.id,
                name: r.name,
                price: r.price,
                description: r.description,
                image: r.image,
            })
            .collect())
    }
}
