//! 编辑会话控制器：打开、轮询与释放时的锁状态迁移。

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::remote::{ClientIdentity, Lock, LockApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Unlocked,
    AcquiringLock,
    OwnedByMe,
    OwnedByOther,
    LockUnknown,
}

/// 根据远端报告的锁与当前身份判定状态。
pub fn evaluate(lock: Option<&Lock>, identity: &ClientIdentity) -> LockState {
    match lock {
        None => LockState::Unlocked,
        Some(lock) if identity.owns(lock) => LockState::OwnedByMe,
        Some(_) => LockState::OwnedByOther,
    }
}

/// Lock coordination for one open document and one (user, client) pair.
///
/// Nothing is cached across requests: every [`EditorSession::refresh`] asks
/// the remote API again, so a foreign lock release is only noticed on the
/// next poll.
#[derive(Debug)]
pub struct EditorSession<L> {
    api: L,
    file_id: String,
    identity: ClientIdentity,
    state: LockState,
    lock: Option<Lock>,
}

impl<L: LockApi> EditorSession<L> {
    pub fn new(api: L, file_id: impl Into<String>, identity: ClientIdentity) -> Self {
        Self {
            api,
            file_id: file_id.into(),
            identity,
            state: LockState::Unlocked,
            lock: None,
        }
    }

    /// 打开文档：查询锁，未加锁时尝试获取。
    pub async fn open(api: L, file_id: impl Into<String>, identity: ClientIdentity) -> Self {
        let mut session = Self::new(api, file_id, identity);
        session.refresh().await;
        session
    }

    /// Runs one open/poll transition against fresh lock state.
    pub async fn refresh(&mut self) -> LockState {
        match self.api.get_lock(&self.file_id).await {
            Ok(None) => self.acquire().await,
            Ok(Some(lock)) => {
                self.state = evaluate(Some(&lock), &self.identity);
                debug!(
                    file_id = %self.file_id,
                    holder = %lock.user,
                    state = ?self.state,
                    "lock polled"
                );
                self.lock = Some(lock);
            }
            Err(err) => {
                warn!(file_id = %self.file_id, error = %err, "lock query failed");
                self.state = LockState::LockUnknown;
                self.lock = None;
            }
        }
        self.state
    }

    async fn acquire(&mut self) {
        self.state = LockState::AcquiringLock;
        match self.api.acquire_lock(&self.file_id, &self.identity).await {
            Ok(lock) => {
                self.state = evaluate(Some(&lock), &self.identity);
                info!(
                    file_id = %self.file_id,
                    user = %self.identity.user,
                    client = %self.identity.client,
                    "lock acquired"
                );
                self.lock = Some(lock);
            }
            Err(err) => {
                // TODO: tell "already locked" apart from transport failures once
                // the remote API returns a distinguishable status for contention.
                warn!(file_id = %self.file_id, error = %err, "lock acquire failed");
                self.state = LockState::LockUnknown;
                self.lock = None;
            }
        }
    }

    /// 若当前会话持有锁则释放；失败只记录日志。
    pub async fn release_if_owned(&mut self) -> bool {
        let current = match self.api.get_lock(&self.file_id).await {
            Ok(current) => current,
            Err(err) => {
                warn!(file_id = %self.file_id, error = %err, "lock query before release failed");
                return false;
            }
        };
        if !current.as_ref().is_some_and(|lock| self.identity.owns(lock)) {
            self.state = evaluate(current.as_ref(), &self.identity);
            self.lock = current;
            return false;
        }
        match self.api.release_lock(&self.file_id).await {
            Ok(()) => {
                info!(file_id = %self.file_id, user = %self.identity.user, "lock released");
                self.state = LockState::Unlocked;
                self.lock = None;
                true
            }
            Err(err) => {
                warn!(file_id = %self.file_id, error = %err, "lock release failed");
                false
            }
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn lock(&self) -> Option<&Lock> {
        self.lock.as_ref()
    }

    pub fn owns_lock(&self) -> bool {
        self.state == LockState::OwnedByMe
    }

    /// 他人持锁时编辑器只读，仅允许强制保存。
    pub fn read_only(&self) -> bool {
        self.state == LockState::OwnedByOther
    }
}
