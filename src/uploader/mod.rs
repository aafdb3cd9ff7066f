// 上传队列模块
//
// - task: 任务与状态机
// - transport: 单文件 HTTP 传输与进度上报
// - manager: 有界并发的上传队列（暂停/恢复/重试/取消）
// - listener: 宿主回调

pub mod listener;
pub mod manager;
pub mod task;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use listener::{NoopListener, UploadQueueListener};
pub use manager::{overall_progress, QueueState, UploadEntry, UploadQueue};
pub use task::{FileSource, UploadFile, UploadTask, UploadTaskStatus};
pub use transport::{HttpTransport, ProgressReporter, TransportJob, UploadTransport};
