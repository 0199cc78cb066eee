//! 回收站页面与操作。

use axum::extract::{Extension, Path};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use minijinja::context;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::CurrentUser;
use crate::cache::ResponseCache;
use crate::error::ApiError;
use crate::format::NodeView;
use crate::remote::RemoteClient;
use crate::views::Views;

pub fn routes() -> Router {
    Router::new()
        .route("/trash", get(trash_view).delete(empty_trash))
        .route("/trash/{file_id}/restore", post(restore_item))
        .route("/trash/{file_id}", delete(delete_item))
}

/// 回收站列表，最近删除的在前；加载失败时在页面内提示。
pub async fn trash_view(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(views): Extension<Arc<Views>>,
    Extension(user): Extension<CurrentUser>,
) -> Response {
    let (files, error) = match remote
        .with_token(&user.token)
        .list_trash(&user.username)
        .await
    {
        Ok(mut nodes) => {
            nodes.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
            (nodes.iter().map(NodeView::from).collect::<Vec<_>>(), None)
        }
        Err(err) => {
            let err = ApiError::from(err);
            if matches!(err, ApiError::Unauthorized) {
                return views.error_page(err);
            }
            warn!(user = %user.username, error = %err.message(), "trash listing failed");
            (Vec::new(), Some(err.message()))
        }
    };

    match views.render(
        "trash.html",
        context! {
            title => "BDPADrive - Trash",
            user => &user.username,
            files => files,
            error => error,
        },
    ) {
        Ok(html) => html.into_response(),
        Err(err) => views.error_page(err),
    }
}

pub async fn restore_item(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(cache): Extension<Arc<ResponseCache>>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    remote
        .with_token(&user.token)
        .restore_from_trash(&file_id)
        .await?;
    cache.invalidate_user(&user.username).await;
    info!(user = %user.username, file_id = %file_id, "restored from trash");
    Ok(Json(json!({ "success": true, "message": "File restored successfully" })))
}

pub async fn delete_item(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    remote
        .with_token(&user.token)
        .delete_from_trash(&file_id)
        .await?;
    info!(user = %user.username, file_id = %file_id, "deleted permanently");
    Ok(Json(json!({ "success": true, "message": "File permanently deleted" })))
}

pub async fn empty_trash(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    remote
        .with_token(&user.token)
        .empty_trash(&user.username)
        .await?;
    info!(user = %user.username, "trash emptied");
    Ok(Json(json!({ "success": true, "message": "Trash emptied successfully" })))
}
