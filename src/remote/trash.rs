//! 回收站：移入、列出、恢复、彻底删除与清空。

use reqwest::Method;

use super::{Node, RemoteError, UserApi, send_empty, send_json};

impl UserApi<'_> {
    pub async fn move_to_trash(&self, file_id: &str) -> Result<(), RemoteError> {
        let builder = self.request(Method::POST, &["filesystem", "id", file_id, "trash"])?;
        send_empty(builder).await
    }

    pub async fn list_trash(&self, username: &str) -> Result<Vec<Node>, RemoteError> {
        let builder = self.request(Method::GET, &["filesystem", username, "trash"])?;
        Ok(send_json(builder).await?.unwrap_or_default())
    }

    pub async fn restore_from_trash(&self, file_id: &str) -> Result<(), RemoteError> {
        let builder = self.request(Method::POST, &["filesystem", "id", file_id, "restore"])?;
        send_empty(builder).await
    }

    pub async fn delete_from_trash(&self, file_id: &str) -> Result<(), RemoteError> {
        let builder = self.request(Method::DELETE, &["filesystem", "id", file_id, "trash"])?;
        send_empty(builder).await
    }

    pub async fn empty_trash(&self, username: &str) -> Result<(), RemoteError> {
        let builder = self.request(Method::DELETE, &["filesystem", username, "trash"])?;
        send_empty(builder).await
    }
}
