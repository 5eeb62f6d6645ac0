use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use userapi_core::error::AppError;
use userapi_core::user::ValidationErrors;

/// JSON error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ValidationErrors>,
}

/// An HTTP error: status plus JSON body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.into(),
                details: None,
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn validation(details: ValidationErrors) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: "Validation failed".to_string(),
                details: Some(details),
            },
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(details) => Self::validation(details),
            AppError::InvalidArgument(msg) => Self::bad_request(msg),
            AppError::NotFound(msg) => Self::not_found(msg),
            AppError::Conflict(msg) => Self::new(StatusCode::CONFLICT, msg),
            other => {
                error!("Request failed: {}", other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use userapi_core::user::FieldError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (AppError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let err = ApiError::from(AppError::Database("password=hunter2".into()));
        assert_eq!(err.body.error, "Internal server error");
    }

    #[test]
    fn test_validation_body() {
        let details = ValidationErrors::from(vec![FieldError::new("email", "email is required")]);
        let err = ApiError::from(AppError::Validation(details));
        let json = serde_json::to_value(&err.body).unwrap();
        assert_eq!(json["error"], "Validation failed");
        assert_eq!(json["details"][0]["field"], "email");
    }

    #[test]
    fn test_plain_body_omits_details() {
        let json = serde_json::to_value(&ApiError::not_found("gone").body).unwrap();
        assert!(json.get("details").is_none());
    }
}
