use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::service::ServiceError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error rendered to HTTP clients as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "An unexpected error occurred",
        )
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidUrl(reason) => Self::bad_request(format!("Invalid URL: {reason}")),
            // An undecodable code is indistinguishable from an unknown one
            ServiceError::InvalidCode | ServiceError::NotFound => {
                Self::new(StatusCode::NOT_FOUND, "Short URL not found")
            }
            ServiceError::Inactive => Self::new(StatusCode::GONE, "Short URL has been deactivated"),
            ServiceError::Expired => Self::new(StatusCode::GONE, "Short URL has expired"),
            ServiceError::Internal(e) => {
                tracing::error!(error = %e, "internal error while handling request");
                Self::internal()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_status_mapping() {
        let cases = [
            (ServiceError::InvalidUrl("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::InvalidCode, StatusCode::NOT_FOUND),
            (ServiceError::NotFound, StatusCode::NOT_FOUND),
            (ServiceError::Inactive, StatusCode::GONE),
            (ServiceError::Expired, StatusCode::GONE),
            (
                ServiceError::Internal(anyhow::anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = ApiError::from(ServiceError::Internal(anyhow::anyhow!("password=hunter2")));
        assert!(!err.message.contains("hunter2"));
    }

    #[test]
    fn test_inactive_and_expired_messages_differ() {
        let inactive = ApiError::from(ServiceError::Inactive);
        let expired = ApiError::from(ServiceError::Expired);
        assert_ne!(inactive.message, expired.message);
    }
}
