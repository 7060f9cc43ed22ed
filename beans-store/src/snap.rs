//! Hosted-checkout payment provider over its REST API.

use async_trait::async_trait;
use beans_core::payment::{CustomerDetails, GatewayError, PaymentGateway, PaymentToken};
use serde_json::{json, Value};
use tracing::debug;

use crate::app_config::GatewayConfig;

pub struct SnapGateway {
    client: reqwest::Client,
    base_url: String,
    server_key: String,
}

impl SnapGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            server_key: config.server_key.clone(),
        })
    }
}

/// Request body for a new transaction
pub fn transaction_request(order_id: &str, amount: i64, customer: &CustomerDetails) -> Value {
    json!({
        "transaction_details": {
            "order_id": order_id,
            "gross_amount": amount,
        },
        "credit_card": {
            "secure": true,
        },
        "customer_details": customer,
    })
}

fn parse_token(body: &Value) -> Result<PaymentToken, GatewayError> {
    let token = body["token"]
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or(GatewayError::MissingToken)?;

    Ok(PaymentToken {
        token: token.to_string(),
        redirect_url: body["redirect_url"].as_str().map(String::from),
    })
}

#[async_trait]
impl PaymentGateway for SnapGateway {
    async fn request_token(
        &self,
        order_id: &str,
        amount: i64,
        customer: &CustomerDetails,
    ) -> Result<PaymentToken, GatewayError> {
        let url = format!("{}/snap/v1/transactions", self.base_url);
        debug!(order_id, amount, "Requesting payment token");

        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.server_key, Some(""))
            .json(&transaction_request(order_id, amount, customer))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Request(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        parse_token(&body)
    }
}
