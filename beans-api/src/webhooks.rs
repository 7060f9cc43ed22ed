use axum::{body::Bytes, extract::State, routing::post, Router};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_notification))
}

/// POST /v1/webhooks/payments
/// Payment provider notifications. Every outcome is acknowledged with 200 so the
/// provider stops redelivering; failures are logged by the reconciler.
pub async fn handle_payment_notification(State(state): State<AppState>, body: Bytes) -> &'static str {
    let outcome = state.reconciler.reconcile_bytes(&body).await;
    tracing::debug!(?outcome, "Payment notification acknowledged");
    "ok"
}
