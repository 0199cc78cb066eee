//! 远端 Drive API 客户端：统一的请求构建、鉴权头与错误映射。

mod filesystem;
mod lock;
mod sharing;
mod trash;
mod users;
mod versions;

pub use filesystem::{NewNode, Node, NodeKind, SearchParams};
pub use lock::{ClientIdentity, Lock, LockApi, generate_client_id};
pub use users::UserProfile;
pub use versions::{NewVersion, Version};

use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::API_KEY_HEADER;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("invalid api url: {0}")]
    InvalidUrl(String),
    #[error("no response received from server: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Status { status: StatusCode, message: String },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RemoteError {
    /// 远端是否以指定状态码拒绝了请求。
    pub fn is_status(&self, expected: StatusCode) -> bool {
        matches!(self, RemoteError::Status { status, .. } if *status == expected)
    }
}

/// Shared HTTP client for the remote drive API.
#[derive(Clone, Debug)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl RemoteClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let base_url =
            Url::parse(base_url).map_err(|err| RemoteError::InvalidUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    /// 绑定用户令牌，返回按用户鉴权的 API 句柄。
    pub fn with_token<'a>(&'a self, token: &'a str) -> UserApi<'a> {
        UserApi {
            client: self,
            token,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| RemoteError::InvalidUrl(self.base_url.to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        token: Option<&str>,
    ) -> Result<RequestBuilder, RemoteError> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "remote request");
        let mut builder = self.http.request(method, url);
        if let Some(key) = self.api_key.as_deref() {
            builder = builder.header(API_KEY_HEADER, key);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }
}

/// Remote API calls made on behalf of one signed-in user.
#[derive(Clone, Copy, Debug)]
pub struct UserApi<'a> {
    client: &'a RemoteClient,
    token: &'a str,
}

impl UserApi<'_> {
    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, RemoteError> {
        self.client.request(method, segments, Some(self.token))
    }
}

/// 发送请求并解析 JSON；空响应体或 `null` 视为缺省值。
async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<Option<T>, RemoteError> {
    let response = builder.send().await?;
    let status = response.status();
    let bytes = response.bytes().await?;
    if !status.is_success() {
        return Err(RemoteError::Status {
            status,
            message: error_message(status, &bytes),
        });
    }
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(serde_json::from_slice::<Option<T>>(&bytes)?)
}

/// 发送请求，忽略响应体内容。
async fn send_empty(builder: RequestBuilder) -> Result<(), RemoteError> {
    send_json::<Value>(builder).await.map(|_| ())
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("Error: {}", status.as_u16()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::RemoteClient;
    use std::time::Duration;
    use wiremock::MockServer;

    pub const TEST_API_KEY: &str = "test-api-key";
    pub const TEST_TOKEN: &str = "token-user1";

    pub fn client_for(server: &MockServer) -> RemoteClient {
        RemoteClient::new(
            &format!("{}/v1", server.uri()),
            Some(TEST_API_KEY.to_string()),
            Duration::from_secs(5),
        )
        .expect("remote client")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{TEST_API_KEY, TEST_TOKEN, client_for};
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn endpoint_encodes_segments_under_base_path() {
        let client = RemoteClient::new(
            "https://drive.example.test/v1/",
            None,
            Duration::from_secs(1),
        )
        .expect("client");
        let url = client
            .endpoint(&["filesystem", "alice", "my notes", "a?b"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://drive.example.test/v1/filesystem/alice/my%20notes/a%3Fb"
        );
    }

    #[test]
    fn rejects_non_base_url() {
        let result = RemoteClient::new("mailto:drive@example.test", None, Duration::from_secs(1));
        assert!(matches!(result, Err(RemoteError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn sends_api_key_and_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/filesystem/id/f1"))
            .and(header(API_KEY_HEADER, TEST_API_KEY))
            .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "f1",
                "name": "notes.md",
                "type": "file",
                "content": "hello"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let node = client
            .with_token(TEST_TOKEN)
            .get_node("f1")
            .await
            .expect("node");
        assert_eq!(node.name, "notes.md");
        assert_eq!(node.content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn non_success_status_carries_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/filesystem/id/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "message": "node not found" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .with_token(TEST_TOKEN)
            .get_node("missing")
            .await
            .expect_err("should fail");
        assert!(err.is_status(StatusCode::NOT_FOUND));
        assert_eq!(err.to_string(), "node not found");
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let client = RemoteClient::new(
            &format!("http://{addr}/v1"),
            None,
            Duration::from_secs(2),
        )
        .expect("client");

        let err = client
            .with_token(TEST_TOKEN)
            .get_lock("f1")
            .await
            .expect_err("should fail");
        assert!(matches!(err, RemoteError::Transport(_)));
    }
}
