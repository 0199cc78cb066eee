//! 版本历史页面与操作。

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use minijinja::context;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::auth::CurrentUser;
use crate::cache::ResponseCache;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::format::{NodeView, VersionView};
use crate::remote::{NewVersion, RemoteClient};
use crate::views::Views;

pub fn routes() -> Router {
    Router::new()
        .route("/versions/{file_id}", get(versions_view).post(create_version))
        .route(
            "/versions/{file_id}/{version_id}/restore",
            post(restore_version),
        )
        .route("/versions/{file_id}/{version_id}", delete(delete_version))
}

#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    #[serde(default)]
    content: String,
    #[serde(default)]
    comment: Option<String>,
}

pub async fn versions_view(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(views): Extension<Arc<Views>>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
) -> Response {
    match render_versions(&remote, &views, &user, &file_id).await {
        Ok(html) => html.into_response(),
        Err(err) => views.error_page(err),
    }
}

async fn render_versions(
    remote: &RemoteClient,
    views: &Views,
    user: &CurrentUser,
    file_id: &str,
) -> Result<Html<String>, ApiError> {
    let api = remote.with_token(&user.token);
    let node = api.get_node(file_id).await?;
    let mut versions = api.list_versions(file_id).await?;
    versions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let versions: Vec<VersionView> = versions.iter().map(VersionView::from).collect();

    views.render(
        "versions.html",
        context! {
            title => format!("BDPADrive - Versions - {}", node.name),
            user => &user.username,
            file => NodeView::from(&node),
            versions => versions,
        },
    )
}

pub async fn create_version(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
    JsonBody(request): JsonBody<CreateVersionRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let comment = request
        .comment
        .map(|comment| comment.trim().to_string())
        .filter(|comment| !comment.is_empty())
        .unwrap_or_else(|| {
            format!(
                "Version created on {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
            )
        });
    remote
        .with_token(&user.token)
        .create_version(
            &file_id,
            &NewVersion {
                content: request.content,
                comment,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Version created successfully" })),
    ))
}

/// 恢复历史版本会改写文件内容，因此同时清理搜索缓存。
pub async fn restore_version(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(cache): Extension<Arc<ResponseCache>>,
    Extension(user): Extension<CurrentUser>,
    Path((file_id, version_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    remote
        .with_token(&user.token)
        .restore_version(&file_id, &version_id)
        .await?;
    cache.invalidate_user(&user.username).await;
    info!(user = %user.username, file_id = %file_id, version_id = %version_id, "version restored");
    Ok(Json(json!({ "success": true, "message": "Version restored successfully" })))
}

pub async fn delete_version(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(user): Extension<CurrentUser>,
    Path((file_id, version_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    remote
        .with_token(&user.token)
        .delete_version(&file_id, &version_id)
        .await?;
    Ok(Json(json!({ "success": true, "message": "Version deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::make_user;
    use crate::remote::test_support::client_for;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(server: &MockServer) -> Router {
        routes()
            .layer(Extension(Arc::new(client_for(server))))
            .layer(Extension(Arc::new(Views::load().expect("views"))))
            .layer(Extension(Arc::new(ResponseCache::new(Duration::from_secs(60)))))
            .layer(Extension(make_user("alice", "c1")))
    }

    #[tokio::test]
    async fn page_lists_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/filesystem/id/f1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "f1", "name": "plan.md", "type": "file"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/filesystem/id/f1/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "v1", "comment": "first draft", "createdAt": 1_000 },
                { "id": "v2", "comment": "second draft", "createdAt": 2_000 }
            ])))
            .mount(&server)
            .await;

        let response = app(&server)
            .oneshot(
                Request::builder()
                    .uri("/versions/f1")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let html = String::from_utf8_lossy(&bytes);
        let second = html.find("second draft").expect("second");
        let first = html.find("first draft").expect("first");
        assert!(second < first);
    }

    #[tokio::test]
    async fn create_uses_given_comment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/filesystem/id/f1/versions"))
            .and(body_json(json!({ "content": "text", "comment": "milestone" })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let response = app(&server)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/versions/f1")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "content": "text", "comment": "milestone" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn restore_and_delete_hit_version_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/filesystem/id/f1/versions/v1/restore"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/filesystem/id/f1/versions/v2"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let app = app(&server);
        let restore = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/versions/f1/v1/restore")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(restore.status(), StatusCode::OK);

        let delete = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/versions/f1/v2")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(delete.status(), StatusCode::OK);
    }
}
