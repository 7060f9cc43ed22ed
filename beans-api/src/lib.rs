use axum::{
    http::Method,
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod error;
pub mod middleware;
pub mod orders;
pub mod state;
pub mod webhooks;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let customer = orders::routes().route_layer(from_fn_with_state(
        state.clone(),
        middleware::customer_auth_middleware,
    ));
    let admin = admin::routes().route_layer(from_fn_with_state(
        state.clone(),
        middleware::admin_auth_middleware,
    ));

    Router::new()
        .route("/health", get(health))
        .merge(customer)
        .merge(admin)
        .merge(webhooks::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
