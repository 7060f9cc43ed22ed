use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub const ROLE_CUSTOMER: &str = "CUSTOMER";
pub const ROLE_ADMIN: &str = "ADMIN";

// ============================================================================
// JWT Claims
// ============================================================================

/// Claims issued by the auth service. `sub` is the numeric user id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, StatusCode> {
        self.sub.parse().map_err(|_| StatusCode::UNAUTHORIZED)
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

fn authenticate(state: &AppState, req: &Request) -> Result<Claims, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    // Reject tokens whose subject is not a user id
    token_data.claims.user_id()?;

    Ok(token_data.claims)
}

// ============================================================================
// Customer Authentication Middleware
// ============================================================================

pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims = authenticate(&state, &req)?;

    if claims.role != ROLE_CUSTOMER && claims.role != ROLE_ADMIN {
        return Err(StatusCode::FORBIDDEN);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims = authenticate(&state, &req)?;

    if !claims.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
