//! 后台清理任务：过期会话、登录失败记录与搜索缓存。

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::auth::{SessionStore, prune_expired_sessions, prune_login_attempts};
use crate::cache::ResponseCache;
use crate::config::{CACHE_PRUNE_INTERVAL_SECS, SESSION_PRUNE_INTERVAL_SECS};

pub fn spawn_background_tasks(sessions: Arc<SessionStore>, cache: Arc<ResponseCache>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SESSION_PRUNE_INTERVAL_SECS));
        loop {
            interval.tick().await;
            prune_expired_sessions(&sessions).await;
            prune_login_attempts(&sessions).await;
            debug!("session store pruned");
        }
    });

    if cache.enabled() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(CACHE_PRUNE_INTERVAL_SECS));
            loop {
                interval.tick().await;
                cache.prune_expired().await;
            }
        });
    }
}
