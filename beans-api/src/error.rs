use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use beans_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            CoreError::InvalidTransition { .. } => AppError::ConflictError(err.to_string()),
            CoreError::InvalidRequest(_) | CoreError::MalformedPayload(_) => {
                AppError::ValidationError(err.to_string())
            }
            CoreError::StorageFailure(_)
            | CoreError::GatewayFailure(_)
            | CoreError::NotificationFailure(_) => AppError::InternalServerError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beans_core::OrderStatus;

    #[test]
    fn test_status_codes() {
        let cases = [
            (CoreError::NotFound("order x".into()), StatusCode::NOT_FOUND),
            (
                CoreError::InvalidTransition {
                    from: OrderStatus::Done,
                    to: OrderStatus::Sent,
                },
                StatusCode::CONFLICT,
            ),
            (CoreError::InvalidRequest("empty".into()), StatusCode::BAD_REQUEST),
            (CoreError::StorageFailure("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).into_response().status(), expected);
        }
    }
}
