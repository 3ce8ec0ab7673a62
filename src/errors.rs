use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::errors::{ResourceError, ToolError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("unauthorized: {message}")]
    Unauthorized {
        code: &'static str,
        message: &'static str,
    },
    #[error("not found: {message}")]
    NotFound {
        code: &'static str,
        message: &'static str,
        details: Value,
    },
    #[error("internal error")]
    Internal { code: &'static str, message: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(code: &'static str, message: &'static str) -> Self {
        Self::Unauthorized { code, message }
    }

    pub fn not_found(code: &'static str, message: &'static str, details: Value) -> Self {
        Self::NotFound {
            code,
            message,
            details,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }
}

impl From<ResourceError> for AppError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::NotFound(uri) => Self::not_found(
                "resource_not_found",
                "unknown resource uri",
                json!({ "uri": uri }),
            ),
            read @ ResourceError::Read { .. } => Self::internal(read.to_string()),
            other => Self::bad_request("invalid_resource", other.to_string()),
        }
    }
}

impl From<ToolError> for AppError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound(name) => Self::not_found(
                "tool_not_found",
                "unknown tool name",
                json!({ "name": name }),
            ),
            ToolError::InvalidArguments(message) => {
                Self::bad_request("invalid_arguments", message)
            }
            ToolError::Validation(message) => Self::bad_request("validation_error", message),
            ToolError::Execution(message) => Self::internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            Self::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message, json!({})),
            Self::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, code, message.to_string(), json!({}))
            }
            Self::NotFound {
                code,
                message,
                details,
            } => (StatusCode::NOT_FOUND, code, message.to_string(), details),
            Self::Internal { code, message } => {
                tracing::error!(error = %message, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    "internal server error".to_string(),
                    json!({}),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_resource_maps_to_not_found_with_uri() {
        let error = AppError::from(ResourceError::NotFound("memo://missing".to_string()));
        match error {
            AppError::NotFound { code, details, .. } => {
                assert_eq!(code, "resource_not_found");
                assert_eq!(details["uri"], "memo://missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn tool_validation_maps_to_bad_request() {
        let error = AppError::from(ToolError::validation("path must be in root"));
        assert!(error.to_string().contains("bad request"));
    }

    #[test]
    fn unauthorized_renders_401() {
        let response = AppError::unauthorized("missing_token", "missing authorization header")
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
