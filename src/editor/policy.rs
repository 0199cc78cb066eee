//! 保存冲突策略：是否允许写入，以及是否需要先做版本快照。

use crate::remote::{ClientIdentity, Lock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveDecision {
    Permit,
    Conflict(Lock),
}

/// Decides a save attempt against the lock fetched at save time.
///
/// A save goes through when nobody holds the lock, when the caller's exact
/// (user, client) pair holds it, or when the caller forces it. Anything else
/// is a conflict carrying the current holder.
pub fn decide_save(current: Option<&Lock>, identity: &ClientIdentity, force: bool) -> SaveDecision {
    match current {
        None => SaveDecision::Permit,
        Some(_) if force => SaveDecision::Permit,
        Some(lock) if identity.owns(lock) => SaveDecision::Permit,
        Some(lock) => SaveDecision::Conflict(lock.clone()),
    }
}

/// 内容发生变化且未显式关闭时，写入前需要快照旧内容。
pub fn needs_snapshot(previous: Option<&str>, next: &str, create_version: bool) -> bool {
    create_version && previous.unwrap_or_default() != next
}
