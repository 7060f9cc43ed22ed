pub mod effects;
pub mod lifecycle;
pub mod mock;
pub mod orchestrator;
pub mod reconciler;
pub mod resiliency;

pub use effects::NotificationDispatcher;
pub use lifecycle::{LifecycleEngine, Notice, SideEffect, Source, Transition};
pub use mock::{MockBehavior, MockPaymentGateway};
pub use orchestrator::{OrderIdGenerator, OrderOrchestrator};
pub use reconciler::{PaymentEvent, Reconciliation, SignatureVerifier, WebhookReconciler};
pub use resiliency::{CircuitBreaker, CircuitState, GuardedGateway};
