//! 文件锁接口：查询、获取与释放远端编辑锁。

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use tracing::warn;
use uuid::Uuid;

use super::{RemoteError, UserApi, send_empty, send_json};

/// Exclusive editing claim on one document, as reported by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    pub user: String,
    #[serde(default)]
    pub client: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

/// The (user, client) pair a browser session edits as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user: String,
    pub client: String,
}

impl ClientIdentity {
    pub fn new(user: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            client: client.into(),
        }
    }

    /// 锁的持有者是否正是当前用户的当前会话。
    /// 未记录 client 的锁只能按用户匹配。
    pub fn owns(&self, lock: &Lock) -> bool {
        lock.user == self.user && (lock.client.is_empty() || lock.client == self.client)
    }
}

/// 生成会话级客户端标识，只保证唯一性。
pub fn generate_client_id() -> String {
    format!("client-{}", Uuid::new_v4().simple())
}

/// Lock operations against the source of truth. Every call is a fresh round trip.
pub trait LockApi {
    fn get_lock(
        &self,
        file_id: &str,
    ) -> impl Future<Output = Result<Option<Lock>, RemoteError>> + Send;

    fn acquire_lock(
        &self,
        file_id: &str,
        identity: &ClientIdentity,
    ) -> impl Future<Output = Result<Lock, RemoteError>> + Send;

    fn release_lock(&self, file_id: &str) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

impl LockApi for UserApi<'_> {
    async fn get_lock(&self, file_id: &str) -> Result<Option<Lock>, RemoteError> {
        let builder = self.request(Method::GET, &["filesystem", "id", file_id, "lock"])?;
        match send_json::<Value>(builder).await {
            Ok(value) => Ok(value.and_then(lock_from_value)),
            Err(err) if err.is_status(StatusCode::NOT_FOUND) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn acquire_lock(
        &self,
        file_id: &str,
        identity: &ClientIdentity,
    ) -> Result<Lock, RemoteError> {
        let builder = self
            .request(Method::POST, &["filesystem", "id", file_id, "lock"])?
            .json(&json!({ "user": identity.user, "client": identity.client }));
        let value = send_json::<Value>(builder).await?;
        Ok(value.and_then(lock_from_value).unwrap_or_else(|| Lock {
            user: identity.user.clone(),
            client: identity.client.clone(),
            created_at: None,
        }))
    }

    async fn release_lock(&self, file_id: &str) -> Result<(), RemoteError> {
        let builder = self.request(Method::DELETE, &["filesystem", "id", file_id, "lock"])?;
        send_empty(builder).await
    }
}

/// 解析锁响应；`{ "locked": false }`、空对象或无持有者视为未加锁。
fn lock_from_value(value: Value) -> Option<Lock> {
    let value = match value.get("lock") {
        Some(inner) if inner.is_object() || inner.is_null() => inner.clone(),
        _ => value,
    };
    if value.get("locked").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    let lock = serde_json::from_value::<Lock>(value)
        .ok()
        .filter(|lock| !lock.user.is_empty())?;
    if lock.client.is_empty() {
        warn!(user = %lock.user, "lock has no client id, matching on user only");
    }
    Some(lock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::test_support::{TEST_TOKEN, client_for};
    use std::collections::HashSet;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn client_ids_are_distinct() {
        let ids: HashSet<String> = (0..256).map(|_| generate_client_id()).collect();
        assert_eq!(ids.len(), 256);
    }

    #[test]
    fn ownership_requires_user_and_client() {
        let lock = Lock {
            user: "user1".into(),
            client: "client-a".into(),
            created_at: None,
        };
        assert!(ClientIdentity::new("user1", "client-a").owns(&lock));
        assert!(!ClientIdentity::new("user1", "client-b").owns(&lock));
        assert!(!ClientIdentity::new("user2", "client-a").owns(&lock));
    }

    #[test]
    fn lock_without_client_matches_on_user() {
        let lock = lock_from_value(json!({ "locked": true, "user": "user1" })).expect("lock");
        assert!(ClientIdentity::new("user1", "client-a").owns(&lock));
        assert!(!ClientIdentity::new("user2", "client-a").owns(&lock));
    }

    #[test]
    fn lock_payload_shapes() {
        assert_eq!(lock_from_value(json!({})), None);
        assert_eq!(lock_from_value(json!({ "locked": false })), None);
        assert_eq!(lock_from_value(json!({ "lock": null })), None);
        let lock = lock_from_value(json!({ "lock": { "user": "bob", "client": "c1" } }))
            .expect("wrapped lock");
        assert_eq!(lock.user, "bob");
        let lock = lock_from_value(json!({ "locked": true, "user": "test-user" })).expect("lock");
        assert_eq!(lock.client, "");
    }

    #[tokio::test]
    async fn missing_lock_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/filesystem/id/f1/lock"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/filesystem/id/f2/lock"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let api = client.with_token(TEST_TOKEN);
        assert_eq!(api.get_lock("f1").await.expect("f1"), None);
        assert_eq!(api.get_lock("f2").await.expect("f2"), None);
    }

    #[tokio::test]
    async fn acquire_posts_user_and_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/filesystem/id/f1/lock"))
            .and(body_json(json!({ "user": "user1", "client": "client-a" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let identity = ClientIdentity::new("user1", "client-a");
        let lock = client
            .with_token(TEST_TOKEN)
            .acquire_lock("f1", &identity)
            .await
            .expect("acquire");
        assert!(identity.owns(&lock));
    }

    #[tokio::test]
    async fn acquire_conflict_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/filesystem/id/f1/lock"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({ "message": "already locked" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .with_token(TEST_TOKEN)
            .acquire_lock("f1", &ClientIdentity::new("user2", "client-b"))
            .await
            .expect_err("conflict");
        assert!(err.is_status(StatusCode::CONFLICT));
    }

    #[tokio::test]
    async fn release_issues_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/filesystem/id/f1/lock"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client
            .with_token(TEST_TOKEN)
            .release_lock("f1")
            .await
            .expect("release");
    }
}
