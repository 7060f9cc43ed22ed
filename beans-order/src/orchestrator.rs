use beans_core::payment::{CustomerDetails, GatewayError, PaymentGateway, PaymentToken};
use beans_core::repository::{CustomerDirectory, OrderRepository, ProductCatalog};
use beans_core::{Clock, CoreError, CoreResult, LineItem, Order, OrderLineRequest};
use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Issues `TRX-{user}-{nanos}` identifiers without a central sequence.
/// The time component never repeats within a process, even if the clock stalls.
#[derive(Debug, Default)]
pub struct OrderIdGenerator {
    last: AtomicI64,
}

impl OrderIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, user_id: i64, now: DateTime<FixedOffset>) -> String {
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000));

        let previous = match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(nanos.max(last + 1)))
        {
            Ok(prev) | Err(prev) => prev,
        };

        format!("TRX-{}-{}", user_id, nanos.max(previous + 1))
    }
}

/// Composes order creation with payment token acquisition
pub struct OrderOrchestrator {
    orders: Arc<dyn OrderRepository>,
    customers: Arc<dyn CustomerDirectory>,
    catalog: Arc<dyn ProductCatalog>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    ids: OrderIdGenerator,
    gateway_timeout: Duration,
}

impl OrderOrchestrator {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        customers: Arc<dyn CustomerDirectory>,
        catalog: Arc<dyn ProductCatalog>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            orders,
            customers,
            catalog,
            gateway,
            clock,
            ids: OrderIdGenerator::new(),
            gateway_timeout,
        }
    }

    /// Create an order in `new` and try to attach a payment token.
    ///
    /// A gateway failure leaves the order without a token; it is still returned.
    pub async fn create_order(&self, user_id: i64, lines: &[OrderLineRequest], total: i64) -> CoreResult<Order> {
        validate_lines(lines)?;

        let customer = self
            .customers
            .find_customer(user_id)
            .await?
            .ok_or_else(|| CoreError::InvalidRequest(format!("user {} not found", user_id)))?;

        let items = self.resolve_items(lines).await?;
        let now = self.clock.now();
        let order = Order::new(self.ids.next(user_id, now), user_id, now, total, items);

        let computed = order.computed_total();
        if computed != total {
            return Err(CoreError::InvalidRequest(format!(
                "total {} does not match line items ({})",
                total, computed
            )));
        }

        let created = self.orders.create(&order).await?;
        info!(order_id = %created.id, user_id, total, items = created.items.len(), "Order created");

        let details = CustomerDetails::from(&customer);
        match self.request_token(&created, &details).await {
            Ok(token) => {
                let updated = self.orders.update_payment_token(&created.id, &token.token).await?;
                info!(order_id = %updated.id, "Payment token attached");
                Ok(updated)
            }
            Err(err) => {
                warn!(order_id = %created.id, error = %err, "Payment token not acquired; order kept without token");
                Ok(created)
            }
        }
    }

    async fn request_token(&self, order: &Order, customer: &CustomerDetails) -> Result<PaymentToken, GatewayError> {
        tokio::time::timeout(
            self.gateway_timeout,
            self.gateway.request_token(&order.id, order.total, customer),
        )
        .await
        .map_err(|_| GatewayError::Timeout)?
    }

    async fn resolve_items(&self, lines: &[OrderLineRequest]) -> CoreResult<Vec<LineItem>> {
        let ids: Vec<i64> = lines.iter().map(|line| line.product_id).collect();
        let products = self.catalog.find_products(&ids).await?;

        lines
            .iter()
            .map(|line| {
                products
                    .iter()
                    .find(|p| p.id == line.product_id)
                    .map(|product| LineItem::new(product.clone(), line.quantity))
                    .ok_or_else(|| CoreError::InvalidRequest(format!("product {} not found", line.product_id)))
            })
            .collect()
    }
}

fn validate_lines(lines: &[OrderLineRequest]) -> CoreResult<()> {
    if lines.is_empty() {
        return Err(CoreError::InvalidRequest("order has no items".to_string()));
    }

    let mut seen = HashSet::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(CoreError::InvalidRequest(format!(
                "quantity for product {} must be positive",
                line.product_id
            )));
        }
        if !seen.insert(line.product_id) {
            return Err(CoreError::InvalidRequest(format!(
                "product {} listed more than once",
                line.product_id
            )));
        }
    }
    Ok(())
}
