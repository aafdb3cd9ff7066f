//! 尽力而为的持久化适配器
//!
//! 对上传队列隐藏存储错误：保存失败只记录警告，读取失败视为"没有历史状态"

use super::store::{NoopSnapshotStore, PersistedQueue, SnapshotStore};
use crate::uploader::{UploadTask, UploadTaskStatus};
use std::sync::Arc;
use tracing::{debug, warn};

/// 队列持久化适配器
#[derive(Clone)]
pub struct QueuePersistence {
    store: Arc<dyn SnapshotStore>,
}

impl QueuePersistence {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// 不持久化
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopSnapshotStore))
    }

    /// 保存当前任务列表
    ///
    /// 失败只记录日志，返回是否成功（仅供调用方统计）
    pub fn save<'a, I>(&self, tasks: I) -> bool
    where
        I: IntoIterator<Item = &'a UploadTask>,
    {
        let snapshot = PersistedQueue {
            queue: tasks.into_iter().cloned().collect(),
        };

        match self.store.save(&snapshot) {
            Ok(()) => true,
            Err(e) => {
                warn!("保存上传队列快照失败（不影响上传）: {}", e);
                false
            }
        }
    }

    /// 读取上次保存的任务列表
    ///
    /// 不存在或解析失败时返回空列表
    pub fn load(&self) -> Vec<UploadTask> {
        match self.store.load() {
            Ok(Some(snapshot)) => {
                debug!("已读取上传队列快照: {} 个任务", snapshot.queue.len());
                snapshot.queue
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("读取上传队列快照失败，视为无历史状态: {}", e);
                Vec::new()
            }
        }
    }

    /// 上次会话中未完成的任务
    pub fn incomplete(&self) -> Vec<UploadTask> {
        self.load()
            .into_iter()
            .filter(|task| task.status != UploadTaskStatus::Completed)
            .collect()
    }

    /// 用户确认后丢弃快照
    pub fn discard(&self) {
        if let Err(e) = self.store.clear() {
            warn!("删除上传队列快照失败: {}", e);
        }
    }
}
