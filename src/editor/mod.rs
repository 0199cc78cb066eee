//! 文档编辑：锁协调、保存冲突策略与页面接口。

pub mod handlers;
pub mod policy;
pub mod session;

use axum::Router;
use axum::routing::{get, post, put};
use std::time::Duration;

use crate::config::Args;

/// Browser-side timing knobs injected into the editor page.
#[derive(Debug, Clone, Copy)]
pub struct EditorConfig {
    pub lock_poll: Duration,
    pub autosave_delay: Duration,
    pub preview_debounce: Duration,
}

impl EditorConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            lock_poll: Duration::from_secs(args.lock_poll_secs),
            autosave_delay: Duration::from_millis(args.autosave_delay_ms),
            preview_debounce: Duration::from_millis(args.preview_debounce_ms),
        }
    }
}

pub fn routes() -> Router {
    Router::new()
        .route("/editor/preview", post(handlers::preview))
        .route("/editor/{file_id}", get(handlers::editor_view))
        .route("/editor/{file_id}/save", post(handlers::save_file))
        .route(
            "/editor/{file_id}/lock",
            get(handlers::lock_status).delete(handlers::release_lock),
        )
        .route("/editor/{file_id}/tags", put(handlers::update_tags))
}
