//! `/api/version`：构建信息。

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    name: &'static str,
    version: &'static str,
    commit: &'static str,
    build_time: &'static str,
    build_env: String,
}

pub async fn get_version_info() -> Json<VersionInfo> {
    Json(VersionInfo {
        name: crate::build::PROJECT_NAME,
        version: crate::build::PKG_VERSION,
        commit: crate::build::SHORT_COMMIT,
        build_time: crate::build::BUILD_TIME,
        build_env: format!(
            "{},{}",
            crate::build::RUST_VERSION,
            crate::build::RUST_CHANNEL
        ),
    })
}
