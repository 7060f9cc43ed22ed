use async_trait::async_trait;
use beans_core::notification::{NotificationError, NotificationSender};
use beans_core::repository::CustomerDirectory;
use beans_core::Order;
use beans_shared::format_rupiah;
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;

use crate::app_config::MailConfig;

/// Sends order notifications through an HTTP mail relay.
pub struct MailRelayNotifier {
    client: reqwest::Client,
    config: MailConfig,
    customers: Arc<dyn CustomerDirectory>,
}

#[derive(Debug, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl MailRelayNotifier {
    pub fn new(config: MailConfig, customers: Arc<dyn CustomerDirectory>) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        Ok(Self {
            client,
            config,
            customers,
        })
    }
}

/// HTML body listing the order lines and the status label.
pub fn render_body(label: &str, order: &Order, customer_name: &str) -> String {
    let mut rows = String::new();
    for item in &order.items {
        // Writing into a String cannot fail
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&item.product.name),
            format_rupiah(item.product.price),
            item.quantity,
            format_rupiah(item.subtotal()),
        );
    }

    format!(
        "<html><body>\
         <p>Hello {name},</p>\
         <p>Transaction <b>{id}</b> on {date}</p>\
         <p>Status: <b>{label}</b></p>\
         <table><tr><th>Product</th><th>Price</th><th>Qty</th><th>Sub Total</th></tr>{rows}</table>\
         <p>Total: <b>{total}</b></p>\
         </body></html>",
        name = escape(customer_name),
        id = escape(&order.id),
        date = order.order_date(),
        label = escape(label),
        rows = rows,
        total = format_rupiah(order.total),
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[async_trait]
impl NotificationSender for MailRelayNotifier {
    async fn send(&self, label: &str, order: &Order) -> Result<(), NotificationError> {
        let customer = self
            .customers
            .find_customer(order.user_id)
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?
            .ok_or(NotificationError::RecipientNotFound(order.user_id))?;

        let message = MailMessage {
            from: self.config.sender.clone(),
            to: customer.email.expose().clone(),
            subject: self.config.subject.clone(),
            html: render_body(label, order, &customer.name),
        };

        let mut request = self.client.post(&self.config.relay_url).json(&message);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                NotificationError::Timeout
            } else {
                NotificationError::Delivery(e.to_string())
            }
        })?;

        if !resp.status().is_success() {
            return Err(NotificationError::Delivery(format!("relay answered {}", resp.status())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCatalog;
    use beans_core::{LineItem, ProductSnapshot};
    use chrono::{FixedOffset, TimeZone};

    fn order() -> Order {
        let created_at = FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 10, 14, 0, 0)
            .unwrap();
        let product = ProductSnapshot {
            id: 1,
            name: "Guetemala <Beans>".to_string(),
            price: 300_000,
            description: String::new(),
            image: String::new(),
        };
        Order::new("TRX-1-5".to_string(), 1, created_at, 600_000, vec![LineItem::new(product, 2)])
    }

    #[test]
    fn test_render_body() {
        let html = render_body("Success, Product On Delivery", &order(), "Sari");

        assert!(html.contains("Hello Sari"));
        assert!(html.contains("TRX-1-5"));
        assert!(html.contains("Monday, 10 June 2024"));
        assert!(html.contains("Success, Product On Delivery"));
        assert!(html.contains("Guetemala &lt;Beans&gt;"));
        assert!(html.contains("Rp300,000.00"));
        assert!(html.contains("Rp600,000.00"));
    }

    #[test]
    fn test_escape_covers_attribute_quotes() {
        assert_eq!(
            escape(r#"<a href="x">O'Brien & co</a>"#),
            "&lt;a href=&quot;x&quot;&gt;O&#39;Brien &amp; co&lt;/a&gt;"
        );
        let html = render_body("success", &order(), r#"Sari "Kopi" O'Neil"#);
        assert!(html.contains("Hello Sari &quot;Kopi&quot; O&#39;Neil,"));
    }

    #[tokio::test]
    async fn test_unknown_recipient() {
        let config = MailConfig {
            relay_url: "http://127.0.0.1:9/send".to_string(),
            api_key: String::new(),
            sender: "WaysBeans <no-reply@waysbeans.test>".to_string(),
            subject: "WAYSBEANS ORDER NOTIFICATION".to_string(),
            timeout_ms: 100,
        };
        let notifier = MailRelayNotifier::new(config, Arc::new(MemoryCatalog::new())).unwrap();

        let err = notifier.send("success", &order()).await.unwrap_err();

        assert!(matches!(err, NotificationError::RecipientNotFound(1)));
    }
}
