use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// REST error taxonomy. Everything maps to the platform's existing
/// `{"error": "..."}` JSON body so the frontend stays compatible.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(detail = %detail, "Internal error");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<crate::notifications::store::StoreError> for ApiError {
    fn from(err: crate::notifications::store::StoreError) -> Self {
        use crate::notifications::store::StoreError;
        match err {
            StoreError::NotFound => ApiError::NotFound("No encontrada".to_string()),
            StoreError::Db(e) => ApiError::Internal(e.to_string()),
            StoreError::Lock => ApiError::Internal("DB lock poisoned".to_string()),
        }
    }
}
