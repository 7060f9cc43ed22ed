use beans_core::repository::{OrderRepository, RepositoryError};
use beans_core::{CoreError, CoreResult, Order, OrderStatus};
use std::sync::Arc;
use tracing::{debug, info};

/// How many times a status write is retried after losing a compare-and-set race
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Whether a gateway-originated transition should notify the customer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Send(&'static str),
    Silent,
}

/// Who asked for the transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Labels come from the engine's own admin table.
    Admin,
    /// The notice is chosen by the reconciler's `MAPPING_RULES` row and passed through as-is.
    Gateway(Notice),
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Admin => "admin",
            Source::Gateway(_) => "gateway",
        }
    }
}

/// Work the caller must perform once the status write is durable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    Notify { label: &'static str },
}

/// Outcome of the pure transition check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AlreadyApplied,
    Apply(Option<SideEffect>),
}

/// Decide whether `current -> requested` is legal and what it triggers.
/// Pure: no storage, no network.
pub fn decide(current: OrderStatus, requested: OrderStatus, source: Source) -> CoreResult<Decision> {
    if current == requested {
        return Ok(Decision::AlreadyApplied);
    }

    if !current.can_transition_to(requested) {
        return Err(CoreError::InvalidTransition {
            from: current,
            to: requested,
        });
    }

    let label = match source {
        Source::Admin => admin_label(requested),
        Source::Gateway(Notice::Send(label)) => Some(label),
        Source::Gateway(Notice::Silent) => None,
    };

    Ok(Decision::Apply(label.map(|label| SideEffect::Notify { label })))
}

fn admin_label(target: OrderStatus) -> Option<&'static str> {
    match target {
        OrderStatus::Rejected => Some("Rejected"),
        OrderStatus::Sent => Some("Success, Product On Delivery"),
        OrderStatus::Done => Some("Success, Product Received"),
        OrderStatus::New
        | OrderStatus::Pending
        | OrderStatus::Success
        | OrderStatus::Failed => None,
    }
}

/// Result of `LifecycleEngine::apply`
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub order: Order,
    pub previous: OrderStatus,
    pub applied: bool,
    pub side_effect: Option<SideEffect>,
}

/// Owns the order status state machine. All status writes go through here.
pub struct LifecycleEngine {
    orders: Arc<dyn OrderRepository>,
}

impl LifecycleEngine {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }

    /// Validate and persist `requested` for the order.
    ///
    /// The returned side effect has not been executed; the caller runs it
    /// after this returns, so a failed write never leaves a notification behind.
    pub async fn apply(&self, order_id: &str, requested: OrderStatus, source: Source) -> CoreResult<Transition> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let order = self.orders.find_by_id(order_id).await?;
            let previous = order.status;

            let side_effect = match decide(previous, requested, source)? {
                Decision::AlreadyApplied => {
                    debug!(order_id, status = %previous, source = source.as_str(), "Transition already applied");
                    return Ok(Transition {
                        order,
                        previous,
                        applied: false,
                        side_effect: None,
                    });
                }
                Decision::Apply(side_effect) => side_effect,
            };

            match self.orders.update_status(order_id, previous, requested).await {
                Ok(updated) => {
                    info!(
                        order_id,
                        from = %previous,
                        to = %requested,
                        source = source.as_str(),
                        "Order status updated"
                    );
                    return Ok(Transition {
                        order: updated,
                        previous,
                        applied: true,
                        side_effect,
                    });
                }
                Err(RepositoryError::Conflict { current, .. }) => {
                    debug!(order_id, attempt, expected = %previous, %current, "Status changed concurrently, re-evaluating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(CoreError::StorageFailure(format!(
            "order {} kept changing concurrently; gave up after {} attempts",
            order_id, MAX_WRITE_ATTEMPTS
        )))
    }
}
