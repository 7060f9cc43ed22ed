use anyhow::Context;
use beans_api::{
    app,
    state::{AppState, AuthConfig, Backends, Timeouts},
};
use beans_core::{Clock, SystemClock};
use beans_order::{CircuitBreaker, GuardedGateway, MockBehavior, MockPaymentGateway, SignatureVerifier};
use beans_store::memory::{MemoryCatalog, MemoryOrderRepository, MemoryOutbox};
use beans_store::{
    Config, DbClient, MailRelayNotifier, PgCatalogRepository, PgOrderRepository, SnapGateway,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MEMORY_DATABASE_URL: &str = "memory";

/// The guarded call must time out before the orchestrator's ceiling does.
const GATEWAY_CEILING_MARGIN: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beans_api=debug,beans_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting WaysBeans order service on port {}", config.server.port);

    let timezone = config.locale.tz().context("Invalid locale")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(timezone));

    let backends = if config.database.url == MEMORY_DATABASE_URL {
        tracing::warn!("Running with in-memory stores and a mock payment gateway");
        memory_backends(clock)
    } else {
        postgres_backends(&config, clock).await?
    };

    let verifier = config
        .webhook
        .verify_signature
        .then(|| SignatureVerifier::new(config.gateway.server_key.clone()));

    let app_state = AppState::new(
        backends,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        Timeouts {
            gateway: config.gateway.timeout() + GATEWAY_CEILING_MARGIN,
            notification: config.mail.timeout(),
        },
        verifier,
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

async fn postgres_backends(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<Backends> {
    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    if config.database.run_migrations {
        db.migrate().await.context("Failed to run migrations")?;
    }

    let catalog = Arc::new(PgCatalogRepository::new(db.pool.clone()));

    let snap = SnapGateway::new(&config.gateway).context("Failed to build payment gateway client")?;
    let breaker = CircuitBreaker::new(
        "payment-gateway",
        config.gateway.breaker_threshold,
        config.gateway.breaker_reset(),
    );
    let gateway = GuardedGateway::new(Arc::new(snap), breaker, config.gateway.timeout());

    let notifier = MailRelayNotifier::new(config.mail.clone(), catalog.clone())
        .context("Failed to build mail relay client")?;

    Ok(Backends {
        orders: Arc::new(PgOrderRepository::new(db.pool.clone())),
        customers: catalog.clone(),
        catalog,
        gateway: Arc::new(gateway),
        notifier: Arc::new(notifier),
        clock,
    })
}

fn memory_backends(clock: Arc<dyn Clock>) -> Backends {
    let catalog = Arc::new(MemoryCatalog::with_sample_data());
    Backends {
        orders: Arc::new(MemoryOrderRepository::new()),
        customers: catalog.clone(),
        catalog,
        gateway: Arc::new(MockPaymentGateway::new(MockBehavior::Succeed)),
        notifier: Arc::new(MemoryOutbox::new()),
        clock,
    }
}
