use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use beans_core::{CoreError, Order, OrderLineRequest, OrderStatus};
use beans_shared::format_rupiah;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::Claims;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    pub total: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: i64,
    pub status: OrderStatus,
    pub total: i64,
    pub total_display: String,
    pub payment_token: Option<String>,
    pub order_date: String,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
    pub products: Vec<OrderItemResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: i64,
    pub name: String,
    pub price: i64,
    pub description: String,
    pub image: String,
    pub quantity: i32,
    pub subtotal: i64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let order_date = order.order_date();
        Self {
            total_display: format_rupiah(order.total),
            order_date,
            products: order
                .items
                .iter()
                .map(|item| OrderItemResponse {
                    id: item.id,
                    product_id: item.product.id,
                    name: item.product.name.clone(),
                    price: item.product.price,
                    description: item.product.description.clone(),
                    image: item.product.image.clone(),
                    quantity: item.quantity,
                    subtotal: item.subtotal(),
                })
                .collect(),
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            total: order.total,
            payment_token: order.payment_token,
            created_at: order.created_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/me", get(list_my_orders))
        .route("/v1/orders/{id}", get(get_order))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/orders
pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let user_id = claims
        .user_id()
        .map_err(|_| AppError::ValidationError("Invalid subject".to_string()))?;

    let order = state
        .orchestrator
        .create_order(user_id, &req.items, req.total)
        .await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /v1/orders/me
pub async fn list_my_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let user_id = claims
        .user_id()
        .map_err(|_| AppError::ValidationError("Invalid subject".to_string()))?;

    let orders = state
        .orders
        .find_by_user(user_id)
        .await
        .map_err(CoreError::from)?;

    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /v1/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.orders.find_by_id(&id).await.map_err(CoreError::from)?;

    // Someone else's order reads as missing
    let owned = claims.user_id().map(|uid| uid == order.user_id).unwrap_or(false);
    if !owned && !claims.is_admin() {
        return Err(CoreError::NotFound(format!("order {}", id)).into());
    }

    Ok(Json(order.into()))
}
