//! 嵌入式静态资源（样式与浏览器脚本）。

use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use rust_embed::RustEmbed;
use std::sync::Arc;

use crate::error::ApiError;
use crate::views::Views;

#[derive(RustEmbed)]
#[folder = "assets"]
struct StaticAssets;

/// `GET /static/{*path}`
pub async fn serve_static(Path(path): Path<String>) -> Result<Response, ApiError> {
    let Some(asset) = StaticAssets::get(&path) else {
        return Err(ApiError::NotFound("not found".into()));
    };
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .map_err(|_| ApiError::Internal("invalid mime type".into()))?,
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );
    Ok((headers, asset.data.into_owned()).into_response())
}

/// 未匹配路由的 404 页面。
pub async fn not_found(Extension(views): Extension<Arc<Views>>) -> Response {
    views.not_found()
}
