pub mod clock;
pub mod notification;
pub mod order;
pub mod payment;
pub mod repository;

pub use clock::{Clock, FixedClock, SystemClock};
pub use order::{Customer, LineItem, Order, OrderLineRequest, OrderStatus, ProductSnapshot};
pub use repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Storage failure: {0}")]
    StorageFailure(String),
    #[error("Payment gateway failure: {0}")]
    GatewayFailure(String),
    #[error("Notification failure: {0}")]
    NotificationFailure(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<RepositoryError> for CoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => CoreError::NotFound(format!("order {}", id)),
            other => CoreError::StorageFailure(other.to_string()),
        }
    }
}

impl From<payment::GatewayError> for CoreError {
    fn from(err: payment::GatewayError) -> Self {
        CoreError::GatewayFailure(err.to_string())
    }
}

impl From<notification::NotificationError> for CoreError {
    fn from(err: notification::NotificationError) -> Self {
        CoreError::NotificationFailure(err.to_string())
    }
}
