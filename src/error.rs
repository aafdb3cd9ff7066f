// 错误类型定义
//
// 只有传输层错误会写入任务的 status/error 字段并触发 on_error，
// 持久化错误只记录日志，分配/登记错误由宿主自行处理

use crate::uploader::UploadTaskStatus;
use thiserror::Error;

/// 队列操作错误
#[derive(Debug, Error)]
pub enum QueueError {
    /// 任务不存在
    #[error("任务不存在: {0}")]
    TaskNotFound(String),

    /// 非法状态迁移
    #[error("任务 {task_id} 不允许从 {from} 迁移到 {to}")]
    InvalidTransition {
        task_id: String,
        from: UploadTaskStatus,
        to: UploadTaskStatus,
    },

    /// 队列已关闭
    #[error("上传队列已关闭")]
    Shutdown,
}

/// 传输层错误
#[derive(Debug, Error)]
pub enum TransportError {
    /// 网络错误（连接失败、请求中断等）
    #[error("网络错误: {0}")]
    Network(String),

    /// 目标端返回非成功状态码
    #[error("上传被拒绝: HTTP {code} {body}")]
    Status { code: u16, body: String },

    /// 本地文件读取失败
    #[error("读取本地文件失败: {0}")]
    Io(#[from] std::io::Error),

    /// 请求超时
    #[error("上传请求超时")]
    Timeout,

    /// 已被取消
    #[error("上传已取消")]
    Cancelled,

    /// 任务缺少本地文件引用（例如从快照恢复的任务）
    #[error("缺少本地文件，请重新选择文件")]
    MissingSource,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// 持久化错误
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("快照读写失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("快照序列化失败: {0}")]
    Serde(#[from] serde_json::Error),
}
