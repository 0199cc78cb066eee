//! 展示层格式化：文件大小、时间与分页。

use chrono::DateTime;
use serde::Serialize;

use crate::config::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::remote::{Node, NodeKind, Version};

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// `1536 -> "1.5 KB"`; zero renders as `0 Bytes`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".into();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", SIZE_UNITS[unit])
}

/// 毫秒时间戳格式化为 UTC `YYYY-MM-DD HH:MM:SS`。
pub fn format_date(millis: Option<i64>) -> String {
    millis
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Clamps the requested page and limit (page >= 1, 1 <= limit <= max).
pub fn normalize_page(page: Option<usize>, limit: Option<usize>) -> (usize, usize) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    (page, limit)
}

pub fn paginate<T>(items: Vec<T>, page: usize, limit: usize) -> (Vec<T>, Pagination) {
    let limit = limit.max(1);
    let page = page.max(1);
    let total = items.len();
    let total_pages = total.div_ceil(limit);
    let slice = items
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();
    (
        slice,
        Pagination {
            page,
            limit,
            total,
            total_pages,
            has_prev: page > 1,
            has_next: page < total_pages,
        },
    )
}

/// Directories first, then files, each group by name.
pub fn sort_nodes(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| {
        let a_dir = a.kind == NodeKind::Directory;
        let b_dir = b.kind == NodeKind::Directory;
        b_dir
            .cmp(&a_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

/// 模板与 JSON 共用的节点视图。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub is_directory: bool,
    pub size: String,
    pub size_bytes: u64,
    pub tags: Vec<String>,
    pub owner: Option<String>,
    pub created: String,
    pub modified: String,
    pub deleted: String,
}

impl From<&Node> for NodeView {
    fn from(node: &Node) -> Self {
        let size_bytes = node
            .size
            .or_else(|| node.content.as_ref().map(|c| c.len() as u64))
            .unwrap_or(0);
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            kind: node.kind,
            is_directory: node.kind == NodeKind::Directory,
            size: format_file_size(size_bytes),
            size_bytes,
            tags: node.tags.clone(),
            owner: node.owner.clone(),
            created: format_date(node.created_at),
            modified: format_date(node.modified_at.or(node.created_at)),
            deleted: format_date(node.deleted_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionView {
    pub id: String,
    pub comment: String,
    pub created: String,
    pub size: String,
}

impl From<&Version> for VersionView {
    fn from(version: &Version) -> Self {
        Self {
            id: version.id.clone(),
            comment: version.comment.clone().unwrap_or_default(),
            created: format_date(version.created_at),
            size: format_file_size(version.content.as_ref().map_or(0, |c| c.len() as u64)),
        }
    }
}
