use async_trait::async_trait;

use crate::order::Order;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Recipient not found for user {0}")]
    RecipientNotFound(i64),
    #[error("Delivery failed: {0}")]
    Delivery(String),
    #[error("Delivery timed out")]
    Timeout,
}

/// Delivers a customer-facing message about an order.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, label: &str, order: &Order) -> Result<(), NotificationError>;
}
