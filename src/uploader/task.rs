// 上传任务定义
//
// 任务本身只是状态快照，所有状态迁移由上传队列（UploadQueue）执行

use crate::error::QueueError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// 上传任务状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UploadTaskStatus {
    /// 等待中
    Pending,
    /// 上传中
    Uploading,
    /// 已暂停
    Paused,
    /// 已完成
    Completed,
    /// 失败
    Failed,
}

impl UploadTaskStatus {
    /// 状态机允许的迁移
    ///
    /// 取消不是状态，而是直接从队列移除，因此不在这里
    pub fn can_transition_to(self, next: UploadTaskStatus) -> bool {
        use UploadTaskStatus::*;
        matches!(
            (self, next),
            (Pending, Uploading)
                | (Uploading, Completed)
                | (Uploading, Failed)
                | (Uploading, Paused)
                | (Paused, Pending)
                | (Failed, Pending)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UploadTaskStatus::Pending => "pending",
            UploadTaskStatus::Uploading => "uploading",
            UploadTaskStatus::Paused => "paused",
            UploadTaskStatus::Completed => "completed",
            UploadTaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 本地文件数据来源
///
/// 队列只持有引用：路径，或引用计数的内存缓冲
#[derive(Debug, Clone)]
pub enum FileSource {
    /// 磁盘文件
    Path(PathBuf),
    /// 内存数据（拖拽、剪贴板等）
    Memory(Bytes),
}

/// 待上传的本地文件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFile {
    /// 文件名
    pub name: String,
    /// 文件大小（字节）
    pub size: u64,
    /// MIME 类型
    pub content_type: String,
    /// 文件内容引用，不参与序列化
    #[serde(skip)]
    pub source: Option<FileSource>,
}

impl UploadFile {
    /// 从磁盘文件创建（读取元数据获取大小）
    pub async fn from_path(path: impl Into<PathBuf>, content_type: impl Into<String>) -> std::io::Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        if metadata.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("不支持直接上传目录: {:?}", path),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Self {
            name,
            size: metadata.len(),
            content_type: content_type.into(),
            source: Some(FileSource::Path(path)),
        })
    }

    /// 从内存数据创建
    pub fn from_bytes(name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            size: data.len() as u64,
            content_type: content_type.into(),
            source: Some(FileSource::Memory(data)),
        }
    }

    /// 是否还持有可上传的内容（快照恢复出来的任务没有）
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }
}

/// 上传任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTask {
    /// 任务ID
    pub id: String,
    /// 本地文件
    pub file: UploadFile,
    /// 预签名上传地址
    pub upload_url: String,
    /// 上传后的公开访问地址
    pub public_url: String,
    /// 目标端对象 key
    pub key: String,
    /// 任务状态
    pub status: UploadTaskStatus,
    /// 进度百分比 (0-100)
    pub progress: u8,
    /// 错误信息（仅 failed 状态）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 已执行的传输次数
    #[serde(default)]
    pub attempts: u32,
    /// 创建时间 (Unix timestamp)
    pub created_at: i64,
    /// 最近一次开始上传时间 (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    /// 完成时间 (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl UploadTask {
    /// 创建新的上传任务
    pub fn new(file: UploadFile, upload_url: String, public_url: String, key: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file,
            upload_url,
            public_url,
            key,
            status: UploadTaskStatus::Pending,
            progress: 0,
            error: None,
            attempts: 0,
            created_at: chrono::Utc::now().timestamp(),
            started_at: None,
            completed_at: None,
        }
    }

    /// 用于统计的有效进度
    ///
    /// pending/failed 视为 0，completed 固定为 100
    pub fn effective_progress(&self) -> u8 {
        match self.status {
            UploadTaskStatus::Pending | UploadTaskStatus::Failed => 0,
            UploadTaskStatus::Completed => 100,
            UploadTaskStatus::Uploading | UploadTaskStatus::Paused => self.progress.min(100),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            UploadTaskStatus::Pending | UploadTaskStatus::Uploading | UploadTaskStatus::Paused
        )
    }

    fn transition(&mut self, next: UploadTaskStatus) -> Result<(), QueueError> {
        if !self.status.can_transition_to(next) {
            return Err(QueueError::InvalidTransition {
                task_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// 标记为上传中
    pub fn mark_uploading(&mut self) -> Result<(), QueueError> {
        self.transition(UploadTaskStatus::Uploading)?;
        self.progress = 0;
        self.error = None;
        self.attempts += 1;
        self.started_at = Some(chrono::Utc::now().timestamp());
        Ok(())
    }

    /// 标记为已完成
    pub fn mark_completed(&mut self) -> Result<(), QueueError> {
        self.transition(UploadTaskStatus::Completed)?;
        self.progress = 100;
        self.completed_at = Some(chrono::Utc::now().timestamp());
        Ok(())
    }

    /// 标记为失败
    pub fn mark_failed(&mut self, error: String) -> Result<(), QueueError> {
        self.transition(UploadTaskStatus::Failed)?;
        self.progress = 0;
        self.error = Some(error);
        Ok(())
    }

    /// 标记为暂停（进度冻结）
    pub fn mark_paused(&mut self) -> Result<(), QueueError> {
        self.transition(UploadTaskStatus::Paused)
    }

    /// 重新排队（恢复或重试），不支持断点续传，进度归零
    pub fn mark_pending(&mut self) -> Result<(), QueueError> {
        self.transition(UploadTaskStatus::Pending)?;
        self.progress = 0;
        self.error = None;
        Ok(())
    }

    /// 更新进度，只接受上传中且递增的值
    ///
    /// 返回是否发生了变化
    pub fn update_progress(&mut self, progress: u8) -> bool {
        let progress = progress.min(100);
        if self.status != UploadTaskStatus::Uploading || progress <= self.progress {
            return false;
        }
        self.progress = progress;
        true
    }
}
