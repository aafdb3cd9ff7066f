// 宿主回调
//
// 回调都在队列的调度协程里执行：on_progress/on_error/on_all_complete 必须立即返回，
// on_complete 可以异步等待（登记资源），队列会等它结束后才启动下一个任务

use crate::uploader::UploadTask;
use async_trait::async_trait;

/// 上传队列监听器
#[async_trait]
pub trait UploadQueueListener: Send + Sync {
    /// 任务状态或进度变化
    fn on_progress(&self, task: &UploadTask);

    /// 任务上传成功
    ///
    /// 返回错误时任务仍保持 completed，错误只记录日志。
    ///
    /// 在调度协程内被等待：实现中不能等待任何 `UploadQueue` 方法的结果，
    /// 否则队列会死锁。需要操作队列时请 `tokio::spawn` 出去。
    async fn on_complete(&self, task: &UploadTask) -> anyhow::Result<()>;

    /// 任务上传失败
    fn on_error(&self, task: &UploadTask, error: &str);

    /// 本批次所有任务都已结束（没有等待中/上传中/暂停的任务）
    fn on_all_complete(&self);
}

/// 不关心回调，只通过 `UploadQueue::subscribe` 消费事件时使用
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

#[async_trait]
impl UploadQueueListener for NoopListener {
    fn on_progress(&self, _task: &UploadTask) {}

    async fn on_complete(&self, _task: &UploadTask) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_error(&self, _task: &UploadTask, _error: &str) {}

    fn on_all_complete(&self) {}
}
