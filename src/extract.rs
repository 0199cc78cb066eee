//! JSON 请求体提取器：解析失败时返回统一的 `{success:false,message}`。

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// `axum::Json` 的替代品，拒绝结果走 `ApiError`。
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match &rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid request body: {}", err.body_text()),
            JsonRejection::JsonSyntaxError(_) => "Malformed JSON body".to_string(),
            JsonRejection::MissingJsonContentType(_) => {
                "Expected Content-Type: application/json".to_string()
            }
            other => other.body_text(),
        };
        ApiError::BadRequest(message)
    }
}
