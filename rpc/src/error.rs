//! RPC error types and their HTTP mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ballot_coordinator::CoordinatorError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("server error: {0}")]
    Server(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Wrap an extractor rejection in the same JSON error shape as `RpcError`,
/// keeping the status code axum assigned to the rejection.
pub(crate) fn rejection_response(rejection: JsonRejection) -> Response {
    let body = Json(ErrorBody {
        error: rejection.body_text(),
    });
    (rejection.status(), body).into_response()
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = match &self {
            RpcError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::Coordinator(CoordinatorError::InvalidTransition { .. }) => {
                StatusCode::CONFLICT
            }
            RpcError::Coordinator(CoordinatorError::ResultsNotPublished) => StatusCode::CONFLICT,
            RpcError::Coordinator(_) | RpcError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
