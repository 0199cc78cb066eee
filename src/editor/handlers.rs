//! 编辑器页面与 JSON 接口。

use axum::Json;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use chrono::Utc;
use minijinja::context;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use super::EditorConfig;
use super::policy::{SaveDecision, decide_save, needs_snapshot};
use super::session::{EditorSession, LockState};
use crate::auth::CurrentUser;
use crate::cache::ResponseCache;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::format::NodeView;
use crate::markdown::render_markdown;
use crate::remote::{LockApi, NewVersion, NodeKind, RemoteClient};
use crate::views::Views;

const LOCK_UNKNOWN_WARNING: &str = "Lock status could not be verified; changes are not protected";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub content: String,
    #[serde(default)]
    pub create_version: Option<bool>,
    #[serde(default)]
    pub force_save: bool,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub seq: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TagsRequest {
    #[serde(default)]
    pub tags: Value,
}

/// `GET /editor/{file_id}`：渲染编辑器并尝试获取锁。
pub async fn editor_view(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(views): Extension<Arc<Views>>,
    Extension(config): Extension<Arc<EditorConfig>>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
) -> Response {
    match render_editor(&remote, &views, &config, &user, file_id).await {
        Ok(html) => html.into_response(),
        Err(err) => views.error_page(err),
    }
}

async fn render_editor(
    remote: &RemoteClient,
    views: &Views,
    config: &EditorConfig,
    user: &CurrentUser,
    file_id: String,
) -> Result<Html<String>, ApiError> {
    let api = remote.with_token(&user.token);
    let node = api.get_node(&file_id).await?;
    if node.kind != NodeKind::File {
        return Err(ApiError::BadRequest("Only text files can be edited".into()));
    }

    let session = EditorSession::open(api, file_id, user.identity()).await;
    let content = node.content.clone().unwrap_or_default();
    let preview = render_markdown(&content);
    let file = NodeView::from(&node);

    views.render(
        "editor.html",
        context! {
            title => format!("BDPADrive - Editor - {}", node.name),
            user => &user.username,
            file => file,
            content => content,
            preview => preview,
            lock => json!({
                "state": session.state(),
                "ownsLock": session.owns_lock(),
                "readOnly": session.read_only(),
                "holder": session.lock().map(|lock| lock.user.clone()),
            }),
            client_id => &user.client_id,
            lock_poll_ms => config.lock_poll.as_millis() as u64,
            autosave_ms => config.autosave_delay.as_millis() as u64,
            preview_debounce_ms => config.preview_debounce.as_millis() as u64,
        },
    )
}

/// `POST /editor/{file_id}/save`：按冲突策略决定是否写入。
pub async fn save_file(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(cache): Extension<Arc<ResponseCache>>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
    JsonBody(request): JsonBody<SaveRequest>,
) -> Result<Json<Value>, ApiError> {
    let api = remote.with_token(&user.token);
    let identity = user.identity();

    let (current, warning) = match api.get_lock(&file_id).await {
        Ok(lock) => (lock, None),
        Err(err) => {
            warn!(file_id = %file_id, error = %err, "lock query failed, saving unverified");
            (None, Some(LOCK_UNKNOWN_WARNING))
        }
    };

    match decide_save(current.as_ref(), &identity, request.force_save) {
        SaveDecision::Conflict(lock) => {
            info!(
                file_id = %file_id,
                user = %identity.user,
                holder = %lock.user,
                "save rejected by lock"
            );
            return Err(ApiError::Locked(lock));
        }
        SaveDecision::Permit => {
            if let Some(lock) = current.as_ref().filter(|lock| !identity.owns(lock)) {
                warn!(file_id = %file_id, user = %identity.user, holder = %lock.user, "forced save");
            }
        }
    }

    let node = api.get_node(&file_id).await?;
    if node.kind != NodeKind::File {
        return Err(ApiError::BadRequest("Only text files can be edited".into()));
    }

    let create_version = request.create_version.unwrap_or(true);
    if needs_snapshot(node.content.as_deref(), &request.content, create_version) {
        let snapshot = NewVersion {
            content: node.content.unwrap_or_default(),
            comment: format!(
                "Automatic version created on {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
            ),
        };
        if let Err(err) = api.create_version(&file_id, &snapshot).await {
            warn!(file_id = %file_id, error = %err, "version snapshot failed");
        }
    }

    api.update_node(&file_id, &json!({ "content": request.content }))
        .await?;
    cache.invalidate_user(&user.username).await;
    info!(file_id = %file_id, user = %identity.user, force = request.force_save, "file saved");

    let mut body = json!({ "success": true, "message": "File saved successfully" });
    if let Some(warning) = warning {
        body["warning"] = json!(warning);
    }
    Ok(Json(body))
}

/// `GET /editor/{file_id}/lock`：执行一次轮询迁移。
pub async fn lock_status(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
) -> Json<Value> {
    let mut session = EditorSession::new(remote.with_token(&user.token), file_id, user.identity());
    let state = session.refresh().await;

    let mut body = json!({
        "success": true,
        "lockInfo": session.lock(),
        "ownsLock": session.owns_lock(),
        "readOnly": session.read_only(),
        "state": state,
    });
    if state == LockState::LockUnknown {
        body["warning"] = json!(LOCK_UNKNOWN_WARNING);
    }
    Json(body)
}

/// `DELETE /editor/{file_id}/lock`：尽力释放，始终返回 204。
pub async fn release_lock(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
) -> StatusCode {
    let mut session = EditorSession::new(remote.with_token(&user.token), file_id, user.identity());
    session.release_if_owned().await;
    StatusCode::NO_CONTENT
}

/// `POST /editor/preview`：渲染预览并回传序号。
pub async fn preview(JsonBody(request): JsonBody<PreviewRequest>) -> Json<Value> {
    Json(json!({
        "success": true,
        "preview": render_markdown(&request.content),
        "seq": request.seq,
    }))
}

/// `PUT /editor/{file_id}/tags`：替换标签列表。
pub async fn update_tags(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(cache): Extension<Arc<ResponseCache>>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
    JsonBody(request): JsonBody<TagsRequest>,
) -> Result<Json<Value>, ApiError> {
    let tags = normalize_tags(&request.tags);
    remote
        .with_token(&user.token)
        .update_node(&file_id, &json!({ "tags": tags }))
        .await?;
    cache.invalidate_user(&user.username).await;
    Ok(Json(json!({
        "success": true,
        "message": "Tags updated successfully",
        "tags": tags,
    })))
}

/// Non-array input clears the tags; blanks and duplicates are dropped.
fn normalize_tags(raw: &Value) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.as_array().into_iter().flatten() {
        let Some(tag) = tag.as_str().map(str::trim).filter(|tag| !tag.is_empty()) else {
            continue;
        };
        if !tags.iter().any(|existing| existing == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}
