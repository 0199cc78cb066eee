//! `/api/search`：带短期缓存的 JSON 搜索接口。

use axum::Json;
use axum::extract::{Extension, Query};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

use crate::auth::CurrentUser;
use crate::cache::ResponseCache;
use crate::error::ApiError;
use crate::format::NodeView;
use crate::remote::{RemoteClient, SearchParams};

pub async fn search_api(
    Extension(remote): Extension<Arc<RemoteClient>>,
    Extension(cache): Extension<Arc<ResponseCache>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiError> {
    let params = SearchParams {
        query: non_empty(params.query),
        kind: non_empty(params.kind),
        tag: non_empty(params.tag),
    };
    let key = params.cache_key();

    if let Some(results) = cache.get(&user.username, &key).await {
        debug!(user = %user.username, key = %key, "search cache hit");
        return Ok(Json(json!({ "success": true, "results": results, "cached": true })));
    }

    let nodes = remote
        .with_token(&user.token)
        .search(&user.username, &params)
        .await?;
    let results = serde_json::to_value(nodes.iter().map(NodeView::from).collect::<Vec<_>>())
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    cache.insert(&user.username, &key, results.clone()).await;

    Ok(Json(json!({ "success": true, "results": results, "cached": false })))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
