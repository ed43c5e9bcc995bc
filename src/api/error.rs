//! HTTP error mapping.
//!
//! Every error response carries `{error, message?, details?}`. Internal
//! detail stays in the server log; clients get a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::errors::DomainError;

/// Wrapper that turns a [`DomainError`] into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<HashMap<String, Vec<String>>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            DomainError::Validation { details } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "validation_failed".into(),
                    message: None,
                    details: Some(details),
                },
            ),
            DomainError::NotFound { entity, id } => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: "not_found".into(),
                    message: Some(format!("{entity} not found: {id}")),
                    details: None,
                },
            ),
            DomainError::Conflict(message) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    error: "conflict".into(),
                    message: Some(message),
                    details: None,
                },
            ),
            DomainError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error: "unauthorized".into(),
                    message: Some(message),
                    details: None,
                },
            ),
            DomainError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody {
                    error: "rate_limited".into(),
                    message: Some("too many requests".into()),
                    details: None,
                },
            ),
            DomainError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorBody {
                    error: "timeout".into(),
                    message: Some("operation exceeded deadline".into()),
                    details: None,
                },
            ),
            DomainError::Database(detail)
            | DomainError::Serialization(detail)
            | DomainError::Internal(detail) => {
                tracing::error!("internal error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "internal".into(),
                        message: Some("internal server error".into()),
                        details: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_per_error_kind() {
        let cases = [
            (DomainError::validation("f", "m"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("x", "1"), StatusCode::NOT_FOUND),
            (DomainError::Conflict("c".into()), StatusCode::CONFLICT),
            (DomainError::Unauthorized("u".into()), StatusCode::UNAUTHORIZED),
            (DomainError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (DomainError::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (DomainError::Internal("i".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }
}
