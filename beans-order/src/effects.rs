use beans_core::notification::{NotificationError, NotificationSender};
use beans_core::{CoreResult, Order};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::lifecycle::{SideEffect, Transition};

/// Executes the side effects returned by the lifecycle engine
pub struct NotificationDispatcher {
    sender: Arc<dyn NotificationSender>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(sender: Arc<dyn NotificationSender>, timeout: Duration) -> Self {
        Self { sender, timeout }
    }

    /// Run a single side effect, bounded by the configured timeout.
    pub async fn execute(&self, effect: SideEffect, order: &Order) -> CoreResult<()> {
        match effect {
            SideEffect::Notify { label } => {
                match tokio::time::timeout(self.timeout, self.sender.send(label, order)).await {
                    Ok(result) => result?,
                    Err(_) => return Err(NotificationError::Timeout.into()),
                }
                info!(order_id = %order.id, label, "Order notification sent");
                Ok(())
            }
        }
    }

    /// Run whatever the transition asked for. Failures are logged and absorbed:
    /// the status change is already durable and is not undone.
    /// Returns true when a notification went out.
    pub async fn dispatch(&self, transition: &Transition) -> bool {
        let Some(effect) = transition.side_effect else {
            return false;
        };

        match self.execute(effect, &transition.order).await {
            Ok(()) => true,
            Err(err) => {
                warn!(order_id = %transition.order.id, error = %err, "Order notification not delivered");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use beans_core::{CoreError, OrderStatus};
    use beans_store::memory::MemoryOutbox;
    use chrono::{FixedOffset, TimeZone};

    struct SlowSender;

    #[async_trait]
    impl NotificationSender for SlowSender {
        async fn send(&self, _label: &str, _order: &Order) -> Result<(), NotificationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn transition(side_effect: Option<SideEffect>) -> Transition {
        let created_at = FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
            .unwrap();
        let mut order = Order::new("TRX-7-1".to_string(), 7, created_at, 0, vec![]);
        order.status = OrderStatus::Success;
        Transition {
            order,
            previous: OrderStatus::New,
            applied: true,
            side_effect,
        }
    }

    #[tokio::test]
    async fn test_dispatch_sends_label() {
        let outbox = Arc::new(MemoryOutbox::new());
        let dispatcher = NotificationDispatcher::new(outbox.clone(), Duration::from_secs(1));

        let sent = dispatcher
            .dispatch(&transition(Some(SideEffect::Notify { label: "success" })))
            .await;

        assert!(sent);
        assert_eq!(outbox.labels_for("TRX-7-1"), vec!["success".to_string()]);
    }

    #[tokio::test]
    async fn test_dispatch_without_effect_sends_nothing() {
        let outbox = Arc::new(MemoryOutbox::new());
        let dispatcher = NotificationDispatcher::new(outbox.clone(), Duration::from_secs(1));

        assert!(!dispatcher.dispatch(&transition(None)).await);
        assert!(outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_is_absorbed() {
        let outbox = Arc::new(MemoryOutbox::new());
        outbox.fail_deliveries(true);
        let dispatcher = NotificationDispatcher::new(outbox.clone(), Duration::from_secs(1));

        let sent = dispatcher
            .dispatch(&transition(Some(SideEffect::Notify { label: "Failed" })))
            .await;

        assert!(!sent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_delivery_times_out() {
        let dispatcher = NotificationDispatcher::new(Arc::new(SlowSender), Duration::from_millis(500));

        let err = dispatcher
            .execute(SideEffect::Notify { label: "success" }, &transition(None).order)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::NotificationFailure(_)));
    }
}
