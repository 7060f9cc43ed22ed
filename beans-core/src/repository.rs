use async_trait::async_trait;

use crate::order::{Customer, Order, OrderStatus, ProductSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Order not found: {0}")]
    NotFound(String),
    /// The compare-and-set lost: the stored status was no longer the expected one.
    #[error("Order {id} is no longer {expected}, found {current}")]
    Conflict {
        id: String,
        expected: OrderStatus,
        current: OrderStatus,
    },
    #[error("Order {0} already carries a different payment token")]
    TokenConflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError>;

    async fn find_by_user(&self, user_id: i64) -> Result<Vec<Order>, RepositoryError>;

    /// Returns `RepositoryError::NotFound` when the id is unknown.
    async fn find_by_id(&self, id: &str) -> Result<Order, RepositoryError>;

    /// Insert the order together with its line items.
    async fn create(&self, order: &Order) -> Result<Order, RepositoryError>;

    /// Atomically move the order from `expected` to `status`.
    async fn update_status(
        &self,
        id: &str,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError>;

    /// Set the payment token once; writing the same token again is accepted.
    async fn update_payment_token(&self, id: &str, token: &str) -> Result<Order, RepositoryError>;
}

/// Read access to customer records owned by the user service
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find_customer(&self, user_id: i64) -> Result<Option<Customer>, RepositoryError>;
}

/// Read access to the product catalog
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Products matching `ids`; unknown ids are simply absent from the result.
    async fn find_products(&self, ids: &[i64]) -> Result<Vec<ProductSnapshot>, RepositoryError>;
}
