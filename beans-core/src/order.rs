use beans_shared::Masked;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Layout used when an order date is shown to customers.
pub const ORDER_DATE_FORMAT: &str = "%A, %-d %B %Y";

/// Order status in the lifecycle
///
/// ```text
/// new      -> pending | success | failed | rejected
/// pending  -> success | failed
/// success  -> sent
/// sent     -> done
/// done, failed, rejected: terminal
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    New,
    Pending,
    Success,
    Sent,
    Done,
    Failed,
    Rejected,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::New,
        OrderStatus::Pending,
        OrderStatus::Success,
        OrderStatus::Sent,
        OrderStatus::Done,
        OrderStatus::Failed,
        OrderStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Pending => "pending",
            OrderStatus::Success => "success",
            OrderStatus::Sent => "sent",
            OrderStatus::Done => "done",
            OrderStatus::Failed => "failed",
            OrderStatus::Rejected => "rejected",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Done | OrderStatus::Failed | OrderStatus::Rejected)
    }

    /// Whether `self -> next` is an edge of the status graph.
    /// Staying in the same status is not an edge; callers treat it as already applied.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (New, Pending) | (New, Success) | (New, Failed) | (New, Rejected) => true,
            (Pending, Success) | (Pending, Failed) => true,
            (Success, Sent) => true,
            (Sent, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// The single source of truth for a customer's purchase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub user_id: i64,
    pub created_at: DateTime<FixedOffset>,
    pub total: i64,
    pub status: OrderStatus,
    pub payment_token: Option<String>,
    pub items: Vec<LineItem>,
}

impl Order {
    /// A freshly created order, always in `new` and without a payment token.
    pub fn new(id: String, user_id: i64, created_at: DateTime<FixedOffset>, total: i64, items: Vec<LineItem>) -> Self {
        Self {
            id,
            user_id,
            created_at,
            total,
            status: OrderStatus::New,
            payment_token: None,
            items,
        }
    }

    /// Sum of price × quantity over all line items
    pub fn computed_total(&self) -> i64 {
        self.items.iter().map(LineItem::subtotal).sum()
    }

    pub fn order_date(&self) -> String {
        self.created_at.format(ORDER_DATE_FORMAT).to_string()
    }
}

/// Product data captured when the order was placed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub description: String,
    pub image: String,
}

/// An individual product within an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub id: Uuid,
    pub product: ProductSnapshot,
    pub quantity: i32,
}

impl LineItem {
    pub fn new(product: ProductSnapshot, quantity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            product,
            quantity,
        }
    }

    pub fn subtotal(&self) -> i64 {
        self.product.price * i64::from(self.quantity)
    }
}

/// A product and quantity as requested by the customer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderLineRequest {
    pub product_id: i64,
    pub quantity: i32,
}

/// Customer record owned by the user service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    pub address: Masked<String>,
    pub post_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn product(id: i64, price: i64) -> ProductSnapshot {
        ProductSnapshot {
            id,
            name: format!("Beans #{}", id),
            price,
            description: "Single origin".to_string(),
            image: format!("beans-{}.png", id),
        }
    }

    #[test]
    fn test_status_round_trip_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("paid".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_serde_is_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Rejected).unwrap();
        assert_eq!(json, "\"rejected\"");
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for from in OrderStatus::ALL.into_iter().filter(OrderStatus::is_terminal) {
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(to), "{} -> {} must be illegal", from, to);
            }
        }
    }

    #[test]
    fn test_rejection_only_from_new() {
        for from in OrderStatus::ALL {
            let allowed = from.can_transition_to(OrderStatus::Rejected);
            assert_eq!(allowed, from == OrderStatus::New, "{} -> rejected", from);
        }
    }

    #[test]
    fn test_backward_edges_are_illegal() {
        assert!(!OrderStatus::Success.can_transition_to(OrderStatus::New));
        assert!(!OrderStatus::Success.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::New));
        assert!(!OrderStatus::Sent.can_transition_to(OrderStatus::Success));
    }

    #[test]
    fn test_computed_total_and_date() {
        let created_at = FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 4, 10, 0, 0)
            .unwrap();
        let order = Order::new(
            "TRX-1-1".to_string(),
            1,
            created_at,
            125_000,
            vec![LineItem::new(product(1, 50_000), 2), LineItem::new(product(2, 25_000), 1)],
        );

        assert_eq!(order.computed_total(), 125_000);
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.order_date(), "Monday, 4 March 2024");
    }
}
