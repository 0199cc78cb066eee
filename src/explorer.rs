//! 文件浏览：目录列表、搜索结果、创建、重命名与移入回收站。

use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use minijinja::context;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::CurrentUser;
use crate::cache::ResponseCache;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::format::{NodeView, Pagination, normalize_page, paginate, sort_nodes};
use crate::remote::{NewNode, NodeKind, RemoteClient, SearchParams};
use crate::views::Views;

pub fn routes() -> Router {
    Router::new()
        .route("/explorer", get(explorer_view))
        .route("/explorer/create", post(create_item))
        .route("/explorer/{file_id}", delete(delete_item))
        .route("/explorer/{file_id}/rename", put(rename_item))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExplorerQuery {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    search: Option<String>,
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<NodeKind>,
    #[serde(default)]
    parent_path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    #[serde(default)]
    new_name: String,
}

/// `GET /explorer`：目录或搜索结果，目录在前并合并分页。
pub async fn explorer_view(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(views): Extension<Arc<Views>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ExplorerQuery>,
) -> Response {
    let current_path = query
        .path
        .as_deref()
        .filter(|path| !path.is_empty())
        .unwrap_or("/")
        .to_string();
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|search| !search.is_empty())
        .map(str::to_string);
    let (page, limit) = normalize_page(query.page, query.limit);

    let api = remote.with_token(&user.token);
    let listed = match &search {
        Some(term) => {
            let params = SearchParams {
                query: Some(term.clone()),
                ..SearchParams::default()
            };
            api.search(&user.username, &params).await
        }
        None => api.list_dir(&user.username, &current_path).await,
    };

    let (items, pagination, error) = match listed {
        Ok(mut nodes) => {
            sort_nodes(&mut nodes);
            let rows: Vec<NodeView> = nodes.iter().map(NodeView::from).collect();
            let (items, pagination) = paginate(rows, page, limit);
            (items, pagination, None)
        }
        Err(err) => {
            let err = ApiError::from(err);
            if matches!(err, ApiError::Unauthorized) {
                return views.error_page(err);
            }
            warn!(user = %user.username, path = %current_path, error = %err.message(), "explorer listing failed");
            let (_, pagination) = paginate(Vec::<NodeView>::new(), 1, limit);
            (Vec::new(), pagination, Some(err.message()))
        }
    };

    render_explorer(&views, &user, &current_path, search, items, pagination, error)
}

fn render_explorer(
    views: &Views,
    user: &CurrentUser,
    current_path: &str,
    search: Option<String>,
    items: Vec<NodeView>,
    pagination: Pagination,
    error: Option<String>,
) -> Response {
    let (directories, files): (Vec<_>, Vec<_>) =
        items.into_iter().partition(|item| item.is_directory);
    let directories: Vec<DirectoryRow> = directories
        .into_iter()
        .map(|node| DirectoryRow {
            path: child_path(current_path, &node.name),
            node,
        })
        .collect();
    let rendered = views.render(
        "explorer.html",
        context! {
            title => "BDPADrive - Explorer",
            user => &user.username,
            current_path => current_path,
            parent_path => parent_path(current_path),
            is_search_result => search.is_some(),
            search_query => search.unwrap_or_default(),
            directories => directories,
            files => files,
            pagination => pagination,
            error => error,
        },
    );
    match rendered {
        Ok(html) => html.into_response(),
        Err(err) => views.error_page(err),
    }
}

#[derive(Serialize)]
struct DirectoryRow {
    #[serde(flatten)]
    node: NodeView,
    path: String,
}

fn child_path(current: &str, name: &str) -> String {
    format!("{}/{name}", current.trim_end_matches('/'))
}

fn parent_path(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) | None => Some("/".into()),
        Some(idx) => Some(trimmed[..idx].to_string()),
    }
}

/// `POST /explorer/create`
pub async fn create_item(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(cache): Extension<Arc<ResponseCache>>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(request): JsonBody<CreateRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let name = request.name.trim();
    let kind = match request.kind {
        Some(kind @ (NodeKind::File | NodeKind::Directory)) if !name.is_empty() => kind,
        _ => return Err(ApiError::BadRequest("Name and type are required".into())),
    };
    if name.contains('/') {
        return Err(ApiError::BadRequest("Name must not contain '/'".into()));
    }

    let node = NewNode {
        name: name.to_string(),
        kind,
        parent: request
            .parent_path
            .filter(|parent| !parent.is_empty())
            .unwrap_or_else(|| "/".into()),
        content: (kind == NodeKind::File).then(String::new),
    };
    remote
        .with_token(&user.token)
        .create_node(&user.username, &node)
        .await?;
    cache.invalidate_user(&user.username).await;
    info!(user = %user.username, name = %node.name, parent = %node.parent, "node created");

    let label = if kind == NodeKind::Directory { "Folder" } else { "File" };
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": format!("{label} created successfully") })),
    ))
}

/// `DELETE /explorer/{file_id}`：移入回收站。
pub async fn delete_item(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(cache): Extension<Arc<ResponseCache>>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    remote.with_token(&user.token).move_to_trash(&file_id).await?;
    cache.invalidate_user(&user.username).await;
    info!(user = %user.username, file_id = %file_id, "moved to trash");
    Ok(Json(json!({ "success": true, "message": "Item moved to trash" })))
}

pub async fn rename_item(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(cache): Extension<Arc<ResponseCache>>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
    JsonBody(request): JsonBody<RenameRequest>,
) -> Result<Json<Value>, ApiError> {
    let new_name = request.new_name.trim();
    if new_name.is_empty() {
        return Err(ApiError::BadRequest("File ID and new name are required".into()));
    }
    if new_name.contains('/') {
        return Err(ApiError::BadRequest("Name must not contain '/'".into()));
    }
    remote
        .with_token(&user.token)
        .update_node(&file_id, &json!({ "name": new_name }))
        .await?;
    cache.invalidate_user(&user.username).await;
    Ok(Json(json!({ "success": true, "message": "Item renamed successfully" })))
}
