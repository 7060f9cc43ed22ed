use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use beans_core::{CoreError, OrderStatus};
use beans_order::Source;
use serde::Deserialize;

use crate::error::AppError;
use crate::orders::OrderResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/orders", get(list_orders))
        .route("/v1/admin/orders/{id}/status", patch(update_status))
}

/// GET /v1/admin/orders
pub async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state.orders.find_all().await.map_err(CoreError::from)?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// PATCH /v1/admin/orders/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let requested: OrderStatus = req
        .status
        .parse()
        .map_err(|e: beans_core::order::UnknownStatus| AppError::ValidationError(e.to_string()))?;

    let transition = state.engine.apply(&id, requested, Source::Admin).await?;

    // Notification runs after the status is durable; failures are only logged
    state.dispatcher.dispatch(&transition).await;

    Ok(Json(transition.order.into()))
}
