//! Client-facing error taxonomy (spec section 7). Every HTTP handler returns
//! `Result<_, ServerError>`; `IntoResponse` collapses each variant to the
//! status code and `{error}` body the control plane surface promises.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<michael_core::Error> for ServerError {
    fn from(err: michael_core::Error) -> Self {
        match err {
            michael_core::Error::NotFound(id) => ServerError::NotFound(id),
            other => ServerError::Upstream(other.to_string()),
        }
    }
}
