use async_trait::async_trait;
use beans_shared::Masked;
use serde::{Deserialize, Serialize};

use crate::order::Customer;

/// Billing or shipping address sent along with a token request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerAddress {
    pub first_name: String,
    pub phone: Masked<String>,
    pub address: Masked<String>,
    pub postal_code: String,
}

/// Customer details copied from the user record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerDetails {
    pub first_name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    pub billing_address: CustomerAddress,
    pub shipping_address: CustomerAddress,
}

impl From<&Customer> for CustomerDetails {
    fn from(customer: &Customer) -> Self {
        let address = CustomerAddress {
            first_name: customer.name.clone(),
            phone: customer.phone.clone(),
            address: customer.address.clone(),
            postal_code: customer.post_code.clone(),
        };
        Self {
            first_name: customer.name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            billing_address: address.clone(),
            shipping_address: address,
        }
    }
}

/// Token returned by the payment provider for its hosted checkout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentToken {
    pub token: String,
    pub redirect_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    Request(String),
    #[error("Gateway rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Gateway response missing token")]
    MissingToken,
    #[error("Gateway call timed out")]
    Timeout,
    #[error("Gateway circuit open")]
    CircuitOpen,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Obtain a payment token for the order total
    async fn request_token(
        &self,
        order_id: &str,
        amount: i64,
        customer: &CustomerDetails,
    ) -> Result<PaymentToken, GatewayError>;
}
