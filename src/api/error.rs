use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::ShopError;

/// HTTP face of `ShopError`.
#[derive(Debug)]
pub struct ApiError(pub ShopError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            ShopError::ProductInUse
            | ShopError::DuplicateName(_)
            | ShopError::DuplicateEmail(_)
            | ShopError::AccountExists
            | ShopError::CodeCollision(_)
            | ShopError::Conflict => StatusCode::CONFLICT,
            ShopError::InvalidPrice | ShopError::InvalidStatus(_) | ShopError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ShopError::NoEligibleEmployee => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ShopError> for ApiError {
    fn from(e: ShopError) -> Self { Self(e) }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self { Self(ShopError::Validation(e.to_string())) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
