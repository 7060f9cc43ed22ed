use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use beans_api::{
    app,
    state::{AppState, AuthConfig, Backends, Timeouts},
};
use beans_core::repository::OrderRepository;
use beans_core::{FixedClock, Order, OrderStatus};
use beans_order::{MockBehavior, MockPaymentGateway, SignatureVerifier};
use beans_store::memory::{MemoryCatalog, MemoryOrderRepository, MemoryOutbox};
use chrono::{FixedOffset, TimeZone};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    repo: Arc<MemoryOrderRepository>,
    outbox: Arc<MemoryOutbox>,
}

const SERVER_KEY: &str = "sb-server-key";

fn test_app() -> TestApp {
    test_app_with(None)
}

fn test_app_with(verifier: Option<SignatureVerifier>) -> TestApp {
    let repo = Arc::new(MemoryOrderRepository::new());
    let outbox = Arc::new(MemoryOutbox::new());
    let catalog = Arc::new(MemoryCatalog::with_sample_data());
    let clock = FixedClock(
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 10, 14, 0, 0)
            .unwrap(),
    );

    let state = AppState::new(
        Backends {
            orders: repo.clone(),
            customers: catalog.clone(),
            catalog,
            gateway: Arc::new(MockPaymentGateway::new(MockBehavior::Succeed)),
            notifier: outbox.clone(),
            clock: Arc::new(clock),
        },
        AuthConfig {
            secret: SECRET.to_string(),
        },
        Timeouts {
            gateway: Duration::from_secs(2),
            notification: Duration::from_secs(2),
        },
        verifier,
    );

    TestApp {
        router: app(state),
        repo,
        outbox,
    }
}

fn token(user_id: i64, role: &str) -> String {
    let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
    encode(
        &Header::default(),
        &json!({"sub": user_id.to_string(), "role": role, "exp": exp}),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn seeded(id: &str, user_id: i64, status: OrderStatus) -> Order {
    let created_at = FixedOffset::east_opt(7 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 6, 1, 9, 0, 0)
        .unwrap();
    let mut order = Order::new(id.to_string(), user_id, created_at, 0, vec![]);
    order.status = status;
    order
}

async fn send(router: &Router, method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header("Authorization", format!("Bearer {}", t));
    }
    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let response = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

async fn webhook(router: &Router, payload: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/webhooks/payments")
        .header("Content-Type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

#[tokio::test]
async fn test_health() {
    let t = test_app();
    let (status, body) = send(&t.router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn test_create_then_list_own_orders() {
    let t = test_app();
    let customer = token(1, "CUSTOMER");
    let total = MemoryCatalog::sample_price(1) * 2 + MemoryCatalog::sample_price(2);

    let (status, created) = send(
        &t.router,
        "POST",
        "/v1/orders",
        Some(&customer),
        Some(json!({
            "items": [{"product_id": 1, "quantity": 2}, {"product_id": 2, "quantity": 1}],
            "total": total,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("TRX-1-"));
    assert_eq!(created["status"], "new");
    assert_eq!(created["total"], total);
    assert_eq!(created["order_date"], "Monday, 10 June 2024");
    assert_eq!(created["payment_token"], format!("mock-token-{}", id));
    assert_eq!(created["products"].as_array().unwrap().len(), 2);

    let (status, mine) = send(&t.router, "GET", "/v1/orders/me", Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["id"], id.as_str());

    let (status, fetched) = send(&t.router, "GET", &format!("/v1/orders/{}", id), Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id.as_str());
}

#[tokio::test]
async fn test_create_rejects_bad_requests() {
    let t = test_app();
    let customer = token(1, "CUSTOMER");

    let (status, body) = send(
        &t.router,
        "POST",
        "/v1/orders",
        Some(&customer),
        Some(json!({"items": [], "total": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &t.router,
        "POST",
        "/v1/orders",
        Some(&customer),
        Some(json!({"items": [{"product_id": 1, "quantity": 1}], "total": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(t.repo.find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_auth_boundaries() {
    let t = test_app();
    t.repo.seed(seeded("O1", 2, OrderStatus::New));

    let (status, _) = send(&t.router, "GET", "/v1/orders/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&t.router, "GET", "/v1/orders/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&t.router, "GET", "/v1/admin/orders", Some(&token(1, "CUSTOMER")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Another customer's order is not visible
    let (status, _) = send(&t.router, "GET", "/v1/orders/O1", Some(&token(1, "CUSTOMER")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&t.router, "GET", "/v1/orders/O1", Some(&token(9, "ADMIN")), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_settlement_marks_success() {
    let t = test_app();
    t.repo.seed(seeded("O1", 1, OrderStatus::New));

    let (status, body) = webhook(&t.router, r#"{"order_id":"O1","transaction_status":"settlement"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
    let (_, order) = send(&t.router, "GET", "/v1/orders/O1", Some(&token(1, "CUSTOMER")), None).await;
    assert_eq!(order["status"], "success");
    assert_eq!(t.outbox.labels_for("O1"), vec!["success".to_string()]);
}

#[tokio::test]
async fn test_webhook_always_acknowledges() {
    let t = test_app();
    t.repo.seed(seeded("O1", 1, OrderStatus::Done));

    for payload in [
        "not json",
        r#"{"transaction_status":"settlement"}"#,
        r#"{"order_id":"missing","transaction_status":"settlement"}"#,
        r#"{"order_id":"O1","transaction_status":"refund"}"#,
        r#"{"order_id":"O1","transaction_status":"expire"}"#,
    ] {
        let (status, body) = webhook(&t.router, payload).await;
        assert_eq!(status, StatusCode::OK, "{}", payload);
        assert_eq!(body, Value::String("ok".into()));
    }

    assert!(t.outbox.sent().is_empty());
    assert_eq!(t.repo.status_writes(), 0);
}

#[tokio::test]
async fn test_admin_status_update() {
    let t = test_app();
    let admin = token(9, "ADMIN");
    t.repo.seed(seeded("O1", 1, OrderStatus::Success));

    let (status, body) = send(
        &t.router,
        "PATCH",
        "/v1/admin/orders/O1/status",
        Some(&admin),
        Some(json!({"status": "sent"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "sent");
    assert_eq!(t.outbox.labels_for("O1"), vec!["Success, Product On Delivery".to_string()]);

    let (status, all) = send(&t.router, "GET", "/v1/admin/orders", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_admin_invalid_transition_is_conflict() {
    let t = test_app();
    let admin = token(9, "ADMIN");
    t.repo.seed(seeded("O1", 1, OrderStatus::Done));

    let (status, body) = send(
        &t.router,
        "PATCH",
        "/v1/admin/orders/O1/status",
        Some(&admin),
        Some(json!({"status": "sent"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("done"));

    let (status, _) = send(
        &t.router,
        "PATCH",
        "/v1/admin/orders/O1/status",
        Some(&admin),
        Some(json!({"status": "shipped"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &t.router,
        "PATCH",
        "/v1/admin/orders/nope/status",
        Some(&admin),
        Some(json!({"status": "sent"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert!(t.outbox.sent().is_empty());
}

#[tokio::test]
async fn test_admin_replay_notifies_once_then_rejects_going_back() {
    let t = test_app();
    let admin = token(9, "ADMIN");
    t.repo.seed(seeded("O1", 1, OrderStatus::Success));

    for _ in 0..2 {
        let (status, body) = send(
            &t.router,
            "PATCH",
            "/v1/admin/orders/O1/status",
            Some(&admin),
            Some(json!({"status": "sent"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "sent");
    }
    assert_eq!(t.outbox.labels_for("O1"), vec!["Success, Product On Delivery".to_string()]);
    assert_eq!(t.repo.status_writes(), 1);

    let (status, body) = send(
        &t.router,
        "PATCH",
        "/v1/admin/orders/O1/status",
        Some(&admin),
        Some(json!({"status": "new"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (_, order) = send(&t.router, "GET", "/v1/orders/O1", Some(&admin), None).await;
    assert_eq!(order["status"], "sent");
    assert_eq!(t.outbox.sent().len(), 1);
}

#[tokio::test]
async fn test_signed_webhooks_only() {
    let t = test_app_with(Some(SignatureVerifier::new(SERVER_KEY)));
    t.repo.seed(seeded("O1", 1, OrderStatus::New));
    t.repo.seed(seeded("O2", 1, OrderStatus::New));

    // Unsigned and wrongly signed notifications are acknowledged but ignored
    let unsigned = json!({"order_id": "O1", "transaction_status": "settlement"});
    let forged = json!({
        "order_id": "O1",
        "transaction_status": "settlement",
        "status_code": "200",
        "gross_amount": "600000.00",
        "signature_key": SignatureVerifier::new("other-key").sign("O1", "200", "600000.00"),
    });
    for payload in [unsigned, forged] {
        let (status, body) = webhook(&t.router, &payload.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".into()));
    }
    assert_eq!(t.repo.status_writes(), 0);

    let signed = json!({
        "order_id": "O2",
        "transaction_status": "settlement",
        "status_code": "200",
        "gross_amount": "600000.00",
        "signature_key": SignatureVerifier::new(SERVER_KEY).sign("O2", "200", "600000.00"),
    });
    let (status, _) = webhook(&t.router, &signed.to_string()).await;
    assert_eq!(status, StatusCode::OK);

    let admin = token(9, "ADMIN");
    let (_, o1) = send(&t.router, "GET", "/v1/orders/O1", Some(&admin), None).await;
    let (_, o2) = send(&t.router, "GET", "/v1/orders/O2", Some(&admin), None).await;
    assert_eq!(o1["status"], "new");
    assert_eq!(o2["status"], "success");
    assert_eq!(t.outbox.sent(), vec![("O2".to_string(), "success".to_string())]);
}
