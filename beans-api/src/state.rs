use beans_core::notification::NotificationSender;
use beans_core::payment::PaymentGateway;
use beans_core::repository::{CustomerDirectory, OrderRepository, ProductCatalog};
use beans_core::Clock;
use beans_order::{
    LifecycleEngine, NotificationDispatcher, OrderOrchestrator, SignatureVerifier, WebhookReconciler,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// Collaborators the services are wired from
pub struct Backends {
    pub orders: Arc<dyn OrderRepository>,
    pub customers: Arc<dyn CustomerDirectory>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn NotificationSender>,
    pub clock: Arc<dyn Clock>,
}

pub struct Timeouts {
    pub gateway: Duration,
    pub notification: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderRepository>,
    pub engine: Arc<LifecycleEngine>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub reconciler: Arc<WebhookReconciler>,
    pub orchestrator: Arc<OrderOrchestrator>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(
        backends: Backends,
        auth: AuthConfig,
        timeouts: Timeouts,
        verifier: Option<SignatureVerifier>,
    ) -> Self {
        let engine = Arc::new(LifecycleEngine::new(backends.orders.clone()));
        let dispatcher = Arc::new(NotificationDispatcher::new(backends.notifier, timeouts.notification));

        let mut reconciler = WebhookReconciler::new(engine.clone(), dispatcher.clone());
        if let Some(verifier) = verifier {
            reconciler = reconciler.with_signature_verification(verifier);
        }

        let orchestrator = OrderOrchestrator::new(
            backends.orders.clone(),
            backends.customers,
            backends.catalog,
            backends.gateway,
            backends.clock,
            timeouts.gateway,
        );

        Self {
            orders: backends.orders,
            engine,
            dispatcher,
            reconciler: Arc::new(reconciler),
            orchestrator: Arc::new(orchestrator),
            auth,
        }
    }
}
