//! 共享权限：授予、查询与撤销。

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{RemoteError, UserApi, send_empty, send_json};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareEntry {
    pub username: String,
    #[serde(default = "default_permission")]
    pub permission: String,
}

fn default_permission() -> String {
    "read".to_string()
}

impl UserApi<'_> {
    pub async fn share(
        &self,
        file_id: &str,
        username: &str,
        permission: Option<&str>,
    ) -> Result<(), RemoteError> {
        let builder = self
            .request(Method::POST, &["filesystem", "id", file_id, "share"])?
            .json(&json!({
                "username": username,
                "permission": permission.filter(|p| !p.is_empty()).unwrap_or("read"),
            }));
        send_empty(builder).await
    }

    pub async fn share_info(&self, file_id: &str) -> Result<Vec<ShareEntry>, RemoteError> {
        let builder = self.request(Method::GET, &["filesystem", "id", file_id, "share"])?;
        Ok(send_json(builder).await?.unwrap_or_default())
    }

    pub async fn remove_share(&self, file_id: &str, username: &str) -> Result<(), RemoteError> {
        let builder = self.request(
            Method::DELETE,
            &["filesystem", "id", file_id, "share", username],
        )?;
        send_empty(builder).await
    }
}

#[cfg(test)]
mod tests {
    use crate::remote::test_support::{TEST_TOKEN, client_for};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn share_defaults_to_read_permission() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/filesystem/id/f1/share"))
            .and(body_json(json!({ "username": "bob", "permission": "read" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client
            .with_token(TEST_TOKEN)
            .share("f1", "bob", None)
            .await
            .expect("share");
    }
}
