//! 认证处理、会话管理与登录限流。

use axum::extract::{Extension, Form, connect_info::ConnectInfo};
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{body::Body as AxumBody, middleware};
use axum_extra::extract::{CookieJar, cookie::Cookie};
use cookie::time::Duration as CookieDuration;
use minijinja::context;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SESSION_COOKIE_NAME;
use crate::error::ApiError;
use crate::http::{RequestScheme, is_https_request, resolve_client_ip};
use crate::remote::{ClientIdentity, RemoteClient, RemoteError, generate_client_id};
use crate::views::Views;

/// The signed-in user attached to a request by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
    pub token: String,
    pub client_id: String,
}

impl CurrentUser {
    pub fn identity(&self) -> ClientIdentity {
        ClientIdentity::new(self.username.clone(), self.client_id.clone())
    }
}

#[derive(Debug)]
pub struct SessionStore {
    pub sessions: Mutex<HashMap<String, SessionEntry>>,
    pub session_ttl: Duration,
    pub login_attempts: Mutex<HashMap<IpAddr, LoginAttempt>>,
    pub login_window: Duration,
    pub login_max_attempts: u32,
    pub login_lockout: Duration,
}

#[derive(Debug)]
pub struct SessionEntry {
    pub user: CurrentUser,
    pub expires_at: Instant,
}

#[derive(Debug)]
pub struct LoginAttempt {
    pub window_start: Instant,
    pub failures: u32,
    pub locked_until: Option<Instant>,
}

impl SessionStore {
    pub fn new(
        session_ttl: Duration,
        login_max_attempts: u32,
        login_window: Duration,
        login_lockout: Duration,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            session_ttl,
            login_attempts: Mutex::new(HashMap::new()),
            login_window,
            login_max_attempts,
            login_lockout,
        }
    }
}

/// 认证中间件：校验会话 Cookie，页面请求跳转登录页，JSON 请求返回 401。
pub async fn auth_middleware(
    Extension(store): Extension<Arc<SessionStore>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: middleware::Next,
) -> Response {
    if is_auth_exempt_path(req.uri().path()) {
        return next.run(req).await;
    }

    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME)
        && let Some(user) = lookup_session(&store, cookie.value()).await
    {
        req.extensions_mut().insert(user);
        return next.run(req).await;
    }

    if wants_json(req.headers()) {
        return ApiError::Unauthorized.into_response();
    }
    Redirect::to("/auth").into_response()
}

fn is_auth_exempt_path(path: &str) -> bool {
    path == "/"
        || path == "/auth"
        || path.starts_with("/auth/")
        || path.starts_with("/static/")
        || path == "/api/version"
        || path == "/favicon.ico"
}

fn wants_json(headers: &HeaderMap) -> bool {
    let accepts_json = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));
    let sends_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    accepts_json || sends_json
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    email: String,
}

/// 首页：已登录跳转文件浏览，否则跳转登录页。
pub async fn home(Extension(store): Extension<Arc<SessionStore>>, jar: CookieJar) -> Redirect {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME)
        && lookup_session(&store, cookie.value()).await.is_some()
    {
        return Redirect::to("/explorer");
    }
    Redirect::to("/auth")
}

/// 登录/注册页面。
pub async fn auth_page(
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(views): Extension<Arc<Views>>,
    jar: CookieJar,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME)
        && lookup_session(&store, cookie.value()).await.is_some()
    {
        return Redirect::to("/explorer").into_response();
    }
    render_auth(&views, StatusCode::OK, None, None)
}

/// 登录接口：向远端换取令牌，创建会话并写入 Cookie。
#[allow(clippy::too_many_arguments)]
pub async fn auth_login(
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(views): Extension<Arc<Views>>,
    Extension(scheme): Extension<RequestScheme>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let client_ip = resolve_client_ip(&headers, Some(addr.ip())).unwrap_or_else(|| addr.ip());

    if let Some(retry_after) = check_login_rate_limit(&store, client_ip).await {
        let message = format!("Too many login attempts, try again in {retry_after} seconds");
        return render_auth(&views, StatusCode::TOO_MANY_REQUESTS, Some(&message), None);
    }

    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        return render_auth(
            &views,
            StatusCode::BAD_REQUEST,
            Some("Username and password are required"),
            None,
        );
    }

    let token = match remote.login(username, &form.password).await {
        Ok(token) => token,
        Err(RemoteError::Transport(err)) => {
            warn!(error = %err, "login request failed");
            return render_auth(
                &views,
                StatusCode::SERVICE_UNAVAILABLE,
                Some("No response received from server"),
                None,
            );
        }
        Err(err) => {
            register_login_failure(&store, client_ip).await;
            warn!(user = username, error = %err, "login rejected");
            return render_auth(
                &views,
                StatusCode::UNAUTHORIZED,
                Some("Failed to login. Please check your credentials."),
                None,
            );
        }
    };

    clear_login_failures(&store, client_ip).await;
    let (session_token, user) = create_session(&store, username, token).await;
    info!(user = %user.username, client = %user.client_id, "login");

    let secure = is_https_request(&headers, scheme);
    let cookie = Cookie::build((SESSION_COOKIE_NAME, session_token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .max_age(CookieDuration::seconds(store.session_ttl.as_secs() as i64))
        .build();
    (jar.add(cookie), Redirect::to("/explorer")).into_response()
}

/// 注册接口：转发到远端用户服务。
pub async fn auth_register(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(views): Extension<Arc<Views>>,
    Form(form): Form<RegisterForm>,
) -> Response {
    let username = form.username.trim();
    let email = form.email.trim();
    if username.is_empty() || form.password.is_empty() || email.is_empty() {
        return render_auth(
            &views,
            StatusCode::BAD_REQUEST,
            Some("Username, password, and email are required"),
            None,
        );
    }

    match remote.register(username, &form.password, email).await {
        Ok(()) => {
            info!(user = username, "registered");
            render_auth(
                &views,
                StatusCode::OK,
                None,
                Some("Registration successful. Please login."),
            )
        }
        Err(err) => {
            warn!(user = username, error = %err, "registration failed");
            let err = ApiError::from(err);
            render_auth(&views, err.status(), Some(&err.message()), None)
        }
    }
}

/// 登出接口：清理会话并删除 Cookie。
pub async fn auth_logout(
    Extension(store): Extension<Arc<SessionStore>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        remove_session(&store, cookie.value()).await;
    }

    (
        jar.remove(Cookie::build(SESSION_COOKIE_NAME).path("/").build()),
        Redirect::to("/auth"),
    )
}

fn render_auth(
    views: &Views,
    status: StatusCode,
    error: Option<&str>,
    success: Option<&str>,
) -> Response {
    match views.render(
        "auth.html",
        context! {
            title => "BDPADrive - Authentication",
            error => error,
            success => success,
        },
    ) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// 创建会话；客户端标识随会话生成，会话结束即失效。
pub async fn create_session(
    store: &SessionStore,
    username: &str,
    token: String,
) -> (String, CurrentUser) {
    let session_token = Uuid::new_v4().to_string();
    let user = CurrentUser {
        username: username.to_string(),
        token,
        client_id: generate_client_id(),
    };
    let expires_at = Instant::now() + store.session_ttl;
    let mut sessions = store.sessions.lock().await;
    sessions.insert(
        session_token.clone(),
        SessionEntry {
            user: user.clone(),
            expires_at,
        },
    );
    (session_token, user)
}

async fn lookup_session(store: &SessionStore, token: &str) -> Option<CurrentUser> {
    let mut sessions = store.sessions.lock().await;
    let now = Instant::now();
    match sessions.get(token) {
        Some(entry) if entry.expires_at > now => Some(entry.user.clone()),
        _ => {
            sessions.remove(token);
            None
        }
    }
}

async fn remove_session(store: &SessionStore, token: &str) {
    let mut sessions = store.sessions.lock().await;
    sessions.remove(token);
}

/// 结束某用户的全部会话（账号删除后调用）。
pub async fn end_user_sessions(store: &SessionStore, username: &str) {
    let mut sessions = store.sessions.lock().await;
    sessions.retain(|_, entry| entry.user.username != username);
}

async fn check_login_rate_limit(store: &SessionStore, ip: IpAddr) -> Option<u64> {
    if store.login_max_attempts == 0 {
        return None;
    }

    let mut attempts = store.login_attempts.lock().await;
    let now = Instant::now();
    let entry = attempts.entry(ip).or_insert(LoginAttempt {
        window_start: now,
        failures: 0,
        locked_until: None,
    });

    if let Some(locked_until) = entry.locked_until {
        if now < locked_until {
            return Some(locked_until.saturating_duration_since(now).as_secs());
        }
        entry.locked_until = None;
        entry.failures = 0;
        entry.window_start = now;
    }

    if now.duration_since(entry.window_start) > store.login_window {
        entry.window_start = now;
        entry.failures = 0;
    }

    None
}

async fn register_login_failure(store: &SessionStore, ip: IpAddr) {
    if store.login_max_attempts == 0 {
        return;
    }

    let mut attempts = store.login_attempts.lock().await;
    let now = Instant::now();
    let entry = attempts.entry(ip).or_insert(LoginAttempt {
        window_start: now,
        failures: 0,
        locked_until: None,
    });

    if now.duration_since(entry.window_start) > store.login_window {
        entry.window_start = now;
        entry.failures = 0;
        entry.locked_until = None;
    }

    entry.failures = entry.failures.saturating_add(1);
    if entry.failures >= store.login_max_attempts {
        entry.locked_until = Some(now + store.login_lockout);
        warn!(client_ip = %ip, "login locked out");
    }
}

async fn clear_login_failures(store: &SessionStore, ip: IpAddr) {
    let mut attempts = store.login_attempts.lock().await;
    attempts.remove(&ip);
}

/// 清理过期会话。
pub async fn prune_expired_sessions(store: &SessionStore) {
    let mut sessions = store.sessions.lock().await;
    let now = Instant::now();
    sessions.retain(|_, entry| entry.expires_at > now);
}

/// 清理过期的登录失败记录。
pub async fn prune_login_attempts(store: &SessionStore) {
    let mut attempts = store.login_attempts.lock().await;
    let now = Instant::now();
    attempts.retain(|_, entry| {
        if let Some(locked_until) = entry.locked_until {
            return locked_until > now;
        }
        now.duration_since(entry.window_start) <= store.login_window
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::remote::test_support::client_for;
    use axum::Router;
    use axum::routing::get;
    use serde_json::json;
    use std::net::Ipv4Addr;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn make_store() -> Arc<SessionStore> {
        Arc::new(SessionStore::new(
            Duration::from_secs(60),
            2,
            Duration::from_secs(60),
            Duration::from_secs(120),
        ))
    }

    pub(crate) fn make_user(username: &str, client_id: &str) -> CurrentUser {
        CurrentUser {
            username: username.into(),
            token: format!("token-{username}"),
            client_id: client_id.into(),
        }
    }

    fn protected_app(store: Arc<SessionStore>) -> Router {
        Router::new()
            .route("/explorer", get(|| async { "files" }))
            .layer(middleware::from_fn(auth_middleware))
            .layer(Extension(store))
    }

    #[tokio::test]
    async fn anonymous_page_request_redirects_to_auth() {
        let response = protected_app(make_store())
            .oneshot(
                Request::builder()
                    .uri("/explorer")
                    .body(AxumBody::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/auth");
    }

    #[tokio::test]
    async fn anonymous_json_request_gets_401() {
        let response = protected_app(make_store())
            .oneshot(
                Request::builder()
                    .uri("/explorer")
                    .header(header::ACCEPT, "application/json")
                    .body(AxumBody::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_session_passes_through() {
        let store = make_store();
        let (token, _) = create_session(&store, "alice", "remote-token".into()).await;
        let response = protected_app(store)
            .oneshot(
                Request::builder()
                    .uri("/explorer")
                    .header(header::COOKIE, format!("{SESSION_COOKIE_NAME}={token}"))
                    .body(AxumBody::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn each_session_gets_its_own_client_id() {
        let store = make_store();
        let (_, first) = create_session(&store, "alice", "t1".into()).await;
        let (_, second) = create_session(&store, "alice", "t2".into()).await;
        assert_ne!(first.client_id, second.client_id);
        assert_eq!(first.identity().user, "alice");
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_expire_after_ttl() {
        let store = make_store();
        let (token, _) = create_session(&store, "alice", "t1".into()).await;
        assert!(lookup_session(&store, &token).await.is_some());
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(lookup_session(&store, &token).await.is_none());
        assert!(store.sessions.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_failures_lock_out_ip() {
        let store = make_store();
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert_eq!(check_login_rate_limit(&store, ip).await, None);
        register_login_failure(&store, ip).await;
        register_login_failure(&store, ip).await;
        assert_eq!(check_login_rate_limit(&store, ip).await, Some(120));

        tokio::time::advance(Duration::from_secs(121)).await;
        assert_eq!(check_login_rate_limit(&store, ip).await, None);
        prune_login_attempts(&store).await;
    }

    #[tokio::test]
    async fn login_sets_cookie_and_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/users/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "t-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let store = make_store();
        let response = auth_login(
            Extension(store.clone()),
            Extension(Arc::new(client_for(&server))),
            Extension(Arc::new(Views::load().expect("views"))),
            Extension(RequestScheme::Http),
            ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))),
            HeaderMap::new(),
            CookieJar::new(),
            Form(LoginForm {
                username: "alice".into(),
                password: "pw".into(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = response.headers()[header::SET_COOKIE]
            .to_str()
            .expect("cookie");
        assert!(cookie.starts_with(SESSION_COOKIE_NAME));
        let sessions = store.sessions.lock().await;
        let entry = sessions.values().next().expect("session");
        assert_eq!(entry.user.token, "t-1");
    }

    #[tokio::test]
    async fn rejected_login_renders_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/users/session"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "message": "nope" })))
            .mount(&server)
            .await;

        let store = make_store();
        let response = auth_login(
            Extension(store.clone()),
            Extension(Arc::new(client_for(&server))),
            Extension(Arc::new(Views::load().expect("views"))),
            Extension(RequestScheme::Http),
            ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))),
            HeaderMap::new(),
            CookieJar::new(),
            Form(LoginForm {
                username: "alice".into(),
                password: "bad".into(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(store.sessions.lock().await.is_empty());
        assert_eq!(store.login_attempts.lock().await.len(), 1);
    }
}
