//! 文件系统节点：列目录、搜索、读取、创建与更新。

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RemoteError, UserApi, send_empty, send_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
    Symlink,
    #[serde(other)]
    Unknown,
}

/// A file, directory or symlink owned by the remote API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(alias = "_id", alias = "node_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub modified_at: Option<i64>,
    #[serde(default)]
    pub deleted_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub parent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl SearchParams {
    /// 规范化的缓存键片段；以 JSON 数组编码，各字段互不串扰。
    pub fn cache_key(&self) -> String {
        serde_json::json!([self.query, self.kind, self.tag]).to_string()
    }
}

impl UserApi<'_> {
    /// 列出用户目录（`path` 为 `/` 时列根目录）。
    pub async fn list_dir(&self, username: &str, path: &str) -> Result<Vec<Node>, RemoteError> {
        let mut segments = vec!["filesystem", username];
        segments.extend(path.split('/').filter(|segment| !segment.is_empty()));
        if segments.len() == 2 {
            segments.push("");
        }
        let builder = self.request(Method::GET, &segments)?;
        Ok(send_json(builder).await?.unwrap_or_default())
    }

    pub async fn search(
        &self,
        username: &str,
        params: &SearchParams,
    ) -> Result<Vec<Node>, RemoteError> {
        let builder = self
            .request(Method::GET, &["filesystem", username, "search"])?
            .query(params);
        Ok(send_json(builder).await?.unwrap_or_default())
    }

    pub async fn get_node(&self, file_id: &str) -> Result<Node, RemoteError> {
        let builder = self.request(Method::GET, &["filesystem", "id", file_id])?;
        send_json(builder).await?.ok_or_else(|| RemoteError::Status {
            status: reqwest::StatusCode::NOT_FOUND,
            message: "File not found".into(),
        })
    }

    pub async fn create_node(&self, username: &str, node: &NewNode) -> Result<(), RemoteError> {
        let builder = self
            .request(Method::POST, &["filesystem", username])?
            .json(node);
        send_empty(builder).await
    }

    /// 以部分字段更新节点（内容、名称或标签）。
    pub async fn update_node(&self, file_id: &str, patch: &Value) -> Result<(), RemoteError> {
        let builder = self
            .request(Method::PUT, &["filesystem", "id", file_id])?
            .json(patch);
        send_empty(builder).await
    }
}
