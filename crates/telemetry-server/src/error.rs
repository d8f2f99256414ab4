//! Maps `telemetry_core::Error` onto HTTP status + body (spec §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use telemetry_core::Error;

use crate::dto::ErrorBody;

/// Newtype so handlers can `?`-propagate a `telemetry_core::Error`
/// straight into an axum response via `IntoResponse`.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_class) = match &self.0 {
            Error::Validation { .. } => (StatusCode::BAD_REQUEST, "validation"),
            Error::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            Error::Busy => (StatusCode::SERVICE_UNAVAILABLE, "busy"),
            Error::Corruption(_) => (StatusCode::INTERNAL_SERVER_ERROR, "corruption"),
            Error::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io"),
            Error::Serialization(_) => (StatusCode::BAD_REQUEST, "serialization"),
        };
        let body = ErrorBody {
            error: error_class,
            detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
