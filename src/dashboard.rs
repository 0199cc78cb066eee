//! 账号面板：资料展示、修改邮箱与密码、删除账号。

use axum::extract::Extension;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use axum_extra::extract::{CookieJar, cookie::Cookie};
use minijinja::context;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{CurrentUser, SessionStore, end_user_sessions};
use crate::cache::ResponseCache;
use crate::config::SESSION_COOKIE_NAME;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::format::format_file_size;
use crate::remote::{NodeKind, RemoteClient, RemoteError, UserProfile};
use crate::views::Views;

pub fn routes() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard_view))
        .route("/dashboard/email", put(update_email))
        .route("/dashboard/password", put(update_password))
        .route("/dashboard/account", delete(delete_account))
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest {
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    #[serde(default)]
    password: String,
}

/// 账号页；资料加载失败时以空资料渲染并提示错误。
pub async fn dashboard_view(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(views): Extension<Arc<Views>>,
    Extension(user): Extension<CurrentUser>,
) -> Response {
    let (profile, storage_used, error) = match load_account(&remote, &user).await {
        Ok((profile, bytes)) => (profile, format_file_size(bytes), None),
        Err(ApiError::Unauthorized) => return views.error_page(ApiError::Unauthorized),
        Err(err) => {
            warn!(user = %user.username, error = %err.message(), "account load failed");
            let fallback = UserProfile {
                username: user.username.clone(),
                email: String::new(),
            };
            (fallback, format_file_size(0), Some(err.message()))
        }
    };

    match views.render(
        "dashboard.html",
        context! {
            title => "BDPADrive - Dashboard",
            user => &user.username,
            account => context! {
                username => profile.username,
                email => profile.email,
                storage_used => storage_used,
            },
            error => error,
        },
    ) {
        Ok(html) => html.into_response(),
        Err(err) => views.error_page(err),
    }
}

/// Profile plus the byte total of the files in the user's root directory.
async fn load_account(
    remote: &RemoteClient,
    user: &CurrentUser,
) -> Result<(UserProfile, u64), ApiError> {
    let api = remote.with_token(&user.token);
    let mut profile = api.get_user(&user.username).await?;
    if profile.username.is_empty() {
        profile.username = user.username.clone();
    }
    let used = api
        .list_dir(&user.username, "/")
        .await?
        .iter()
        .filter(|node| node.kind == NodeKind::File)
        .filter_map(|node| node.size)
        .sum();
    Ok((profile, used))
}

pub async fn update_email(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(request): JsonBody<EmailRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = request.email.trim();
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email is required".into()));
    }
    remote
        .with_token(&user.token)
        .update_user(&user.username, &json!({ "email": email }))
        .await?;
    info!(user = %user.username, "email updated");
    Ok(Json(json!({ "success": true, "message": "Email updated successfully" })))
}

pub async fn update_password(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(request): JsonBody<PasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.current_password.is_empty() || request.new_password.is_empty() {
        return Err(ApiError::BadRequest(
            "Current password and new password are required".into(),
        ));
    }
    verify_password(
        &remote,
        &user.username,
        &request.current_password,
        "Current password is incorrect",
    )
    .await?;
    remote
        .with_token(&user.token)
        .update_user(&user.username, &json!({ "password": request.new_password }))
        .await?;
    info!(user = %user.username, "password updated");
    Ok(Json(json!({ "success": true, "message": "Password updated successfully" })))
}

/// 删除远端账号后结束该用户的所有会话并清除 Cookie。
pub async fn delete_account(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(cache): Extension<Arc<ResponseCache>>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
    JsonBody(request): JsonBody<DeleteAccountRequest>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    if request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Password is required to delete account".into(),
        ));
    }
    verify_password(&remote, &user.username, &request.password, "Password is incorrect").await?;
    remote
        .with_token(&user.token)
        .delete_user(&user.username)
        .await?;

    end_user_sessions(&store, &user.username).await;
    cache.invalidate_user(&user.username).await;
    info!(user = %user.username, "account deleted");

    Ok((
        jar.remove(Cookie::build(SESSION_COOKIE_NAME).path("/").build()),
        Json(json!({ "success": true, "message": "Account deleted successfully" })),
    ))
}

/// Re-authenticates against `POST /users/session`; a rejected password is a 403.
async fn verify_password(
    remote: &RemoteClient,
    username: &str,
    password: &str,
    rejected: &str,
) -> Result<(), ApiError> {
    match remote.login(username, password).await {
        Ok(_) => Ok(()),
        Err(err @ RemoteError::Transport(_)) => Err(err.into()),
        Err(err) => {
            warn!(user = username, error = %err, "password check failed");
            Err(ApiError::Forbidden(rejected.to_string()))
        }
    }
}
