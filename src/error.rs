//! 统一的 API 错误类型与转换。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::remote::{Lock, RemoteError};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
    Unauthorized,
    Forbidden(String),
    Locked(Lock),
    Upstream { status: StatusCode, message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Locked(_) => StatusCode::LOCKED,
            ApiError::Upstream { status, .. } => *status,
        }
    }

    /// 面向用户的错误描述。
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Internal(msg)
            | ApiError::Forbidden(msg) => msg.clone(),
            ApiError::Unauthorized => "unauthorized".into(),
            ApiError::Locked(lock) => format!("File is locked by {}", lock.user),
            ApiError::Upstream { message, .. } => message.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        match self {
            ApiError::Locked(lock) => (
                status,
                Json(json!({
                    "success": false,
                    "message": message,
                    "lockInfo": lock,
                })),
            )
                .into_response(),
            _ => (
                status,
                Json(json!({ "success": false, "message": message })),
            )
                .into_response(),
        }
    }
}

impl From<RemoteError> for ApiError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Transport(_) => ApiError::Upstream {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "No response received from server".into(),
            },
            RemoteError::Status { status, message } => match status {
                StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
                StatusCode::NOT_FOUND => ApiError::NotFound(message),
                _ => ApiError::Upstream { status, message },
            },
            RemoteError::InvalidUrl(msg) => ApiError::Internal(msg),
            RemoteError::Decode(err) => ApiError::Internal(err.to_string()),
        }
    }
}
