//! 上传队列事件类型定义
//!
//! 队列通过 broadcast 通道推送这些事件，宿主可转发给前端（WebSocket/SSE 等）

use crate::uploader::UploadTaskStatus;
use serde::{Deserialize, Serialize};

/// 上传队列事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// 任务创建
    Created {
        task_id: String,
        file_name: String,
        total_size: u64,
    },
    /// 进度更新
    Progress {
        task_id: String,
        progress: u8,
        /// 队列整体进度
        overall_progress: u8,
    },
    /// 状态变更
    StatusChanged {
        task_id: String,
        old_status: UploadTaskStatus,
        new_status: UploadTaskStatus,
    },
    /// 任务完成
    Completed {
        task_id: String,
        key: String,
        public_url: String,
        completed_at: i64,
    },
    /// 任务失败
    Failed { task_id: String, error: String },
    /// 队列暂停
    Paused { affected: usize },
    /// 队列恢复
    Resumed { affected: usize },
    /// 任务删除（取消或清理）
    Deleted { task_id: String },
    /// 本批次全部结束
    AllCompleted { completed: usize, failed: usize },
}

impl UploadEvent {
    /// 获取任务 ID（队列级事件没有）
    pub fn task_id(&self) -> Option<&str> {
        match self {
            UploadEvent::Created { task_id, .. }
            | UploadEvent::Progress { task_id, .. }
            | UploadEvent::StatusChanged { task_id, .. }
            | UploadEvent::Completed { task_id, .. }
            | UploadEvent::Failed { task_id, .. }
            | UploadEvent::Deleted { task_id } => Some(task_id),
            UploadEvent::Paused { .. }
            | UploadEvent::Resumed { .. }
            | UploadEvent::AllCompleted { .. } => None,
        }
    }

    /// 获取事件类型名称
    pub fn event_type_name(&self) -> &'static str {
        match self {
            UploadEvent::Created { .. } => "created",
            UploadEvent::Progress { .. } => "progress",
            UploadEvent::StatusChanged { .. } => "status_changed",
            UploadEvent::Completed { .. } => "completed",
            UploadEvent::Failed { .. } => "failed",
            UploadEvent::Paused { .. } => "paused",
            UploadEvent::Resumed { .. } => "resumed",
            UploadEvent::Deleted { .. } => "deleted",
            UploadEvent::AllCompleted { .. } => "all_completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = UploadEvent::StatusChanged {
            task_id: "t1".to_string(),
            old_status: UploadTaskStatus::Pending,
            new_status: UploadTaskStatus::Uploading,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "status_changed");
        assert_eq!(json["old_status"], "pending");
        assert_eq!(json["new_status"], "uploading");
    }

    #[test]
    fn test_event_accessors() {
        let progress = UploadEvent::Progress {
            task_id: "t1".to_string(),
            progress: 10,
            overall_progress: 5,
        };
        let drained = UploadEvent::AllCompleted {
            completed: 2,
            failed: 0,
        };

        assert_eq!(progress.task_id(), Some("t1"));
        assert_eq!(drained.task_id(), None);
        assert_eq!(drained.event_type_name(), "all_completed");
    }
}
