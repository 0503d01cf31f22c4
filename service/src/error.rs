//! The HTTP-boundary error sum type (spec.md §7): the only place an
//! internal error becomes a wire response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrMessage {
    detail: String,
}

pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Forbidden(String),
    Internal,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        ApiError::BadRequest(detail.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, Some(detail)),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, Some("Unauthorized".to_string())),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, Some(detail)),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, Some("internal error".to_string())),
        };
        match detail {
            Some(detail) => (status, Json(ErrMessage { detail })).into_response(),
            None => status.into_response(),
        }
    }
}

impl From<signd_backend::Error> for ApiError {
    fn from(e: signd_backend::Error) -> Self {
        match e {
            signd_backend::Error::UnknownKey(k) => ApiError::bad_request(format!("key {k} does not exist")),
            signd_backend::Error::FileTooBig { limit } => {
                ApiError::bad_request(format!("file size exceeds {limit} bytes"))
            }
            signd_backend::Error::EmptyBatch => ApiError::bad_request("No files provided for signing"),
            signd_backend::Error::Canceled => ApiError::bad_request("operation canceled"),
            signd_backend::Error::Configuration(msg) => {
                tracing::error!(error = %msg, "configuration error surfaced at request time");
                ApiError::Internal
            }
            signd_backend::Error::SigningFailed(e) => {
                tracing::error!(error = %e, "signing failed");
                ApiError::Internal
            }
        }
    }
}

impl From<crate::db::Error> for ApiError {
    fn from(e: crate::db::Error) -> Self {
        match e {
            crate::db::Error::UserNotFound => ApiError::Unauthorized,
            crate::db::Error::UserExists => ApiError::bad_request("user already exists"),
            crate::db::Error::Database(e) => {
                tracing::error!(error = %e, "database error");
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn oversize_upload_maps_to_bad_request_with_limit_in_detail() {
        let err: ApiError = signd_backend::Error::FileTooBig { limit: 100 }.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unauthorized_db_error_carries_a_detail_body() {
        let err: ApiError = crate::db::Error::UserNotFound.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn signing_failure_is_hidden_behind_a_generic_internal_error() {
        let err: ApiError = signd_backend::Error::SigningFailed(anyhow::anyhow!("gpg2 exited 2")).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
