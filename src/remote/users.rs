//! 用户账号：登录换取令牌、注册与账号资料维护。

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{RemoteClient, RemoteError, UserApi, send_empty, send_json};

#[derive(Deserialize)]
struct SessionResponse {
    token: Option<String>,
}

/// Account details as reported by `GET /users/{username}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

impl RemoteClient {
    /// 使用用户名密码登录，返回远端签发的令牌。
    pub async fn login(&self, username: &str, password: &str) -> Result<String, RemoteError> {
        let builder = self
            .request(Method::POST, &["users", "session"], None)?
            .json(&json!({ "username": username, "password": password }));
        send_json::<SessionResponse>(builder)
            .await?
            .and_then(|session| session.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| RemoteError::Status {
                status: StatusCode::BAD_GATEWAY,
                message: "Invalid response from server".into(),
            })
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<(), RemoteError> {
        let builder = self.request(Method::POST, &["users"], None)?.json(&json!({
            "username": username,
            "password": password,
            "email": email,
        }));
        send_empty(builder).await
    }
}

impl UserApi<'_> {
    pub async fn get_user(&self, username: &str) -> Result<UserProfile, RemoteError> {
        let builder = self.request(Method::GET, &["users", username])?;
        Ok(send_json(builder).await?.unwrap_or_default())
    }

    /// `PUT /users/{username}`，`patch` 只含要修改的字段（`email` 或 `password`）。
    pub async fn update_user(&self, username: &str, patch: &Value) -> Result<(), RemoteError> {
        let builder = self.request(Method::PUT, &["users", username])?.json(patch);
        send_empty(builder).await
    }

    pub async fn delete_user(&self, username: &str) -> Result<(), RemoteError> {
        let builder = self.request(Method::DELETE, &["users", username])?;
        send_empty(builder).await
    }
}
