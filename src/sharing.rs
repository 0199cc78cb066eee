//! 文件共享页面与操作。

use axum::extract::{Extension, Path};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use minijinja::context;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::format::NodeView;
use crate::remote::RemoteClient;
use crate::views::Views;

const PERMISSIONS: [&str; 2] = ["read", "write"];

pub fn routes() -> Router {
    Router::new()
        .route("/share/{file_id}", get(share_view).post(share_file))
        .route("/share/{file_id}/{username}", delete(remove_share))
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    permission: Option<String>,
}

pub async fn share_view(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(views): Extension<Arc<Views>>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
) -> Response {
    match render_share(&remote, &views, &user, &file_id).await {
        Ok(html) => html.into_response(),
        Err(err) => views.error_page(err),
    }
}

async fn render_share(
    remote: &RemoteClient,
    views: &Views,
    user: &CurrentUser,
    file_id: &str,
) -> Result<Html<String>, ApiError> {
    let api = remote.with_token(&user.token);
    let node = api.get_node(file_id).await?;
    let shares = api.share_info(file_id).await?;
    views.render(
        "share.html",
        context! {
            title => format!("BDPADrive - Sharing - {}", node.name),
            user => &user.username,
            file => NodeView::from(&node),
            shares => shares,
            permissions => PERMISSIONS,
        },
    )
}

pub async fn share_file(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
    JsonBody(request): JsonBody<ShareRequest>,
) -> Result<Json<Value>, ApiError> {
    let target = request.username.trim();
    if target.is_empty() {
        return Err(ApiError::BadRequest("File ID and username are required".into()));
    }
    let permission = request
        .permission
        .as_deref()
        .map(str::trim)
        .filter(|permission| !permission.is_empty())
        .unwrap_or("read");
    if !PERMISSIONS.contains(&permission) {
        return Err(ApiError::BadRequest(format!("Unknown permission: {permission}")));
    }

    remote
        .with_token(&user.token)
        .share(&file_id, target, Some(permission))
        .await?;
    info!(user = %user.username, file_id = %file_id, shared_with = target, permission, "file shared");
    Ok(Json(json!({
        "success": true,
        "message": format!("File shared with {target} successfully"),
    })))
}

pub async fn remove_share(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(user): Extension<CurrentUser>,
    Path((file_id, username)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    remote
        .with_token(&user.token)
        .remove_share(&file_id, &username)
        .await?;
    info!(user = %user.username, file_id = %file_id, shared_with = %username, "share removed");
    Ok(Json(json!({
        "success": true,
        "message": format!("Sharing removed for {username}"),
    })))
}
