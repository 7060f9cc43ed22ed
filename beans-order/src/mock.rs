use async_trait::async_trait;
use beans_core::payment::{CustomerDetails, GatewayError, PaymentGateway, PaymentToken};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Behaviour of `MockPaymentGateway`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Succeed,
    Fail,
    Hang,
}

/// In-process gateway used in tests and local runs without provider credentials
pub struct MockPaymentGateway {
    behavior: MockBehavior,
    calls: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn request_token(
        &self,
        order_id: &str,
        _amount: i64,
        _customer: &CustomerDetails,
    ) -> Result<PaymentToken, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            MockBehavior::Succeed => Ok(PaymentToken {
                token: format!("mock-token-{}", order_id),
                redirect_url: Some(format!("https://pay.example.test/{}", order_id)),
            }),
            MockBehavior::Fail => Err(GatewayError::Rejected {
                status: 401,
                body: "Access denied due to unauthorized transaction".to_string(),
            }),
            MockBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(GatewayError::Timeout)
            }
        }
    }
}
