//! 文件版本：快照列表、创建、恢复与删除。

use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{RemoteError, UserApi, send_empty, send_json};

/// Immutable snapshot of earlier document content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    #[serde(alias = "_id", alias = "version_id")]
    pub id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewVersion {
    pub content: String,
    pub comment: String,
}

impl UserApi<'_> {
    pub async fn list_versions(&self, file_id: &str) -> Result<Vec<Version>, RemoteError> {
        let builder = self.request(Method::GET, &["filesystem", "id", file_id, "versions"])?;
        Ok(send_json(builder).await?.unwrap_or_default())
    }

    pub async fn create_version(
        &self,
        file_id: &str,
        version: &NewVersion,
    ) -> Result<(), RemoteError> {
        let builder = self
            .request(Method::POST, &["filesystem", "id", file_id, "versions"])?
            .json(version);
        send_empty(builder).await
    }

    pub async fn restore_version(&self, file_id: &str, version_id: &str) -> Result<(), RemoteError> {
        let builder = self.request(
            Method::POST,
            &["filesystem", "id", file_id, "versions", version_id, "restore"],
        )?;
        send_empty(builder).await
    }

    pub async fn delete_version(&self, file_id: &str, version_id: &str) -> Result<(), RemoteError> {
        let builder = self.request(
            Method::DELETE,
            &["filesystem", "id", file_id, "versions", version_id],
        )?;
        send_empty(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::test_support::{TEST_TOKEN, client_for};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn create_posts_content_and_comment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/filesystem/id/f1/versions"))
            .and(body_json(json!({ "content": "old", "comment": "before edit" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "v1" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client
            .with_token(TEST_TOKEN)
            .create_version(
                "f1",
                &NewVersion {
                    content: "old".into(),
                    comment: "before edit".into(),
                },
            )
            .await
            .expect("create version");
    }

    #[tokio::test]
    async fn restore_targets_version_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/filesystem/id/f1/versions/v7/restore"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client
            .with_token(TEST_TOKEN)
            .restore_version("f1", "v7")
            .await
            .expect("restore");
    }
}
