// 上传队列
//
// 单个调度协程（actor）独占任务列表，UploadQueue 只是发送命令的句柄。
// 传输在独立协程中执行，通过 WorkerMessage 把进度和结果送回调度协程，
// 所以状态迁移全部串行发生，不需要锁。

use crate::config::{AppConfig, UploadConfig};
use crate::error::{QueueError, TransportError};
use crate::events::{ProgressThrottler, UploadEvent};
use crate::persistence::{FileSnapshotStore, QueuePersistence};
use crate::uploader::{
    HttpTransport, ProgressReporter, TransportJob, UploadFile, UploadQueueListener, UploadTask,
    UploadTaskStatus, UploadTransport,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 事件广播通道容量
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// 加入队列的一个文件及其上传目标
#[derive(Debug, Clone)]
pub struct UploadEntry {
    pub file: UploadFile,
    pub upload_url: String,
    pub public_url: String,
    pub key: String,
}

/// 队列状态快照
#[derive(Debug, Clone, Serialize)]
pub struct QueueState {
    pub total: usize,
    pub pending: usize,
    pub uploading: usize,
    pub paused: usize,
    pub completed: usize,
    pub failed: usize,
    /// 按文件大小加权的整体进度
    pub overall_progress: u8,
    pub is_paused: bool,
    pub tasks: Vec<UploadTask>,
}

impl QueueState {
    fn from_tasks(tasks: &[UploadTask], is_paused: bool) -> Self {
        let count = |status: UploadTaskStatus| tasks.iter().filter(|t| t.status == status).count();
        Self {
            total: tasks.len(),
            pending: count(UploadTaskStatus::Pending),
            uploading: count(UploadTaskStatus::Uploading),
            paused: count(UploadTaskStatus::Paused),
            completed: count(UploadTaskStatus::Completed),
            failed: count(UploadTaskStatus::Failed),
            overall_progress: overall_progress(tasks),
            is_paused,
            tasks: tasks.to_vec(),
        }
    }

    /// 是否没有等待中、上传中或暂停的任务
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.uploading == 0 && self.paused == 0
    }
}

/// 整体进度
///
/// 空队列为 0；所有文件大小都为 0 时按任务数平均
pub fn overall_progress(tasks: &[UploadTask]) -> u8 {
    if tasks.is_empty() {
        return 0;
    }

    let total_size: u128 = tasks.iter().map(|t| t.file.size as u128).sum();
    if total_size == 0 {
        let sum: u32 = tasks.iter().map(|t| t.effective_progress() as u32).sum();
        return (sum / tasks.len() as u32) as u8;
    }

    let weighted: u128 = tasks
        .iter()
        .map(|t| t.file.size as u128 * t.effective_progress() as u128)
        .sum();
    (weighted / total_size).min(100) as u8
}

enum QueueCommand {
    AddFiles {
        entries: Vec<UploadEntry>,
        reply: oneshot::Sender<Vec<String>>,
    },
    Pause {
        reply: oneshot::Sender<usize>,
    },
    Resume {
        reply: oneshot::Sender<usize>,
    },
    Retry {
        task_id: String,
        reply: oneshot::Sender<Result<(), QueueError>>,
    },
    Cancel {
        task_id: String,
        reply: oneshot::Sender<Result<(), QueueError>>,
    },
    GetState {
        reply: oneshot::Sender<QueueState>,
    },
    GetTask {
        task_id: String,
        reply: oneshot::Sender<Option<UploadTask>>,
    },
    ClearCompleted {
        reply: oneshot::Sender<usize>,
    },
    ClearFailed {
        reply: oneshot::Sender<usize>,
    },
    SetMaxConcurrent {
        max: usize,
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// 传输协程发回的消息，attempt 用于识别过期消息
enum WorkerMessage {
    Progress {
        task_id: String,
        attempt: u32,
        progress: u8,
    },
    Finished {
        task_id: String,
        attempt: u32,
        result: Result<(), TransportError>,
    },
}

struct RunningUpload {
    attempt: u32,
    cancel: CancellationToken,
}

struct QueueActor {
    /// 按加入顺序排列，调度时从前往后取 pending
    tasks: Vec<UploadTask>,
    running: HashMap<String, RunningUpload>,
    max_concurrent: usize,
    paused: bool,
    /// 有任务进入 pending/uploading 后置位，触发 on_all_complete 后复位
    drain_armed: bool,
    transport: Arc<dyn UploadTransport>,
    listener: Arc<dyn UploadQueueListener>,
    persistence: QueuePersistence,
    event_tx: broadcast::Sender<UploadEvent>,
    worker_tx: mpsc::UnboundedSender<WorkerMessage>,
    throttler: ProgressThrottler,
}

impl QueueActor {
    async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<QueueCommand>,
        mut worker_rx: mpsc::UnboundedReceiver<WorkerMessage>,
    ) {
        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(QueueCommand::Shutdown { reply }) => {
                        self.abort_all();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        // 所有句柄都已释放
                        self.abort_all();
                        break;
                    }
                },
                Some(message) = worker_rx.recv() => self.handle_worker(message).await,
            }
        }
        info!("上传队列已停止");
    }

    async fn handle_command(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::AddFiles { entries, reply } => {
                let ids = self.add_files(entries);
                let _ = reply.send(ids);
            }
            QueueCommand::Pause { reply } => {
                let _ = reply.send(self.pause());
            }
            QueueCommand::Resume { reply } => {
                let _ = reply.send(self.resume());
            }
            QueueCommand::Retry { task_id, reply } => {
                let _ = reply.send(self.retry(&task_id));
            }
            QueueCommand::Cancel { task_id, reply } => {
                let _ = reply.send(self.cancel(&task_id));
            }
            QueueCommand::GetState { reply } => {
                let _ = reply.send(QueueState::from_tasks(&self.tasks, self.paused));
            }
            QueueCommand::GetTask { task_id, reply } => {
                let task = self.tasks.iter().find(|t| t.id == task_id).cloned();
                let _ = reply.send(task);
            }
            QueueCommand::ClearCompleted { reply } => {
                let _ = reply.send(self.clear_where(UploadTaskStatus::Completed));
            }
            QueueCommand::ClearFailed { reply } => {
                let _ = reply.send(self.clear_where(UploadTaskStatus::Failed));
            }
            QueueCommand::SetMaxConcurrent { max, reply } => {
                let max = max.max(1);
                info!("上传队列: 动态调整最大并发任务数 {} -> {}", self.max_concurrent, max);
                self.max_concurrent = max;
                self.requeue_excess();
                self.schedule();
                let _ = reply.send(());
            }
            QueueCommand::Shutdown { .. } => {}
        }
    }

    fn add_files(&mut self, entries: Vec<UploadEntry>) -> Vec<String> {
        let mut ids = Vec::with_capacity(entries.len());

        for entry in entries {
            let task = UploadTask::new(entry.file, entry.upload_url, entry.public_url, entry.key);
            info!(
                "创建上传任务: id={}, 文件={}, 大小={} bytes",
                task.id, task.file.name, task.file.size
            );
            self.publish(UploadEvent::Created {
                task_id: task.id.clone(),
                file_name: task.file.name.clone(),
                total_size: task.file.size,
            });
            self.listener.on_progress(&task);
            ids.push(task.id.clone());
            self.tasks.push(task);
        }

        if !ids.is_empty() {
            self.drain_armed = true;
            self.persist();
            self.schedule();
        }
        ids
    }

    fn pause(&mut self) -> usize {
        self.paused = true;

        let mut affected = 0;
        for idx in 0..self.tasks.len() {
            if self.tasks[idx].status != UploadTaskStatus::Uploading {
                continue;
            }

            let task_id = self.tasks[idx].id.clone();
            if let Some(run) = self.running.remove(&task_id) {
                run.cancel.cancel();
            }
            self.throttler.forget(&task_id);

            if let Err(e) = self.tasks[idx].mark_paused() {
                warn!("暂停任务失败: {}", e);
                continue;
            }
            let snapshot = self.tasks[idx].clone();
            self.notify_status(&snapshot, UploadTaskStatus::Uploading);
            affected += 1;
        }

        self.persist();
        self.publish(UploadEvent::Paused { affected });
        info!("上传队列已暂停: 中断 {} 个进行中的任务", affected);
        affected
    }

    fn resume(&mut self) -> usize {
        self.paused = false;

        let mut affected = 0;
        for idx in 0..self.tasks.len() {
            if self.tasks[idx].status != UploadTaskStatus::Paused {
                continue;
            }
            if let Err(e) = self.tasks[idx].mark_pending() {
                warn!("恢复任务失败: {}", e);
                continue;
            }
            let snapshot = self.tasks[idx].clone();
            self.notify_status(&snapshot, UploadTaskStatus::Paused);
            affected += 1;
        }

        if affected > 0 {
            self.drain_armed = true;
        }
        self.persist();
        self.publish(UploadEvent::Resumed { affected });
        info!("上传队列已恢复: {} 个任务重新排队", affected);

        self.schedule();
        self.check_drain();
        affected
    }

    fn retry(&mut self, task_id: &str) -> Result<(), QueueError> {
        let idx = self.index_of(task_id)?;
        let status = self.tasks[idx].status;
        if status != UploadTaskStatus::Failed {
            return Err(QueueError::InvalidTransition {
                task_id: task_id.to_string(),
                from: status,
                to: UploadTaskStatus::Pending,
            });
        }

        self.tasks[idx].mark_pending()?;
        let snapshot = self.tasks[idx].clone();
        info!("重试上传任务: {} (已尝试 {} 次)", task_id, snapshot.attempts);

        self.drain_armed = true;
        self.notify_status(&snapshot, UploadTaskStatus::Failed);
        self.persist();
        self.schedule();
        Ok(())
    }

    fn cancel(&mut self, task_id: &str) -> Result<(), QueueError> {
        let idx = self.index_of(task_id)?;
        let task = self.tasks.remove(idx);

        if let Some(run) = self.running.remove(task_id) {
            run.cancel.cancel();
        }
        self.throttler.forget(task_id);

        info!("取消上传任务: {} ({}, 状态={})", task_id, task.file.name, task.status);
        self.persist();
        self.publish(UploadEvent::Deleted {
            task_id: task_id.to_string(),
        });

        self.schedule();
        self.check_drain();
        Ok(())
    }

    /// 并发上限调小后，把最晚加入的超额上传任务中断并放回等待队列
    ///
    /// 它们在列表中的位置不变，仍然先于后加入的 pending 任务被调度
    fn requeue_excess(&mut self) {
        let uploading: Vec<usize> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status == UploadTaskStatus::Uploading)
            .map(|(idx, _)| idx)
            .collect();
        if uploading.len() <= self.max_concurrent {
            return;
        }

        let excess = &uploading[self.max_concurrent..];
        for &idx in excess {
            let task_id = self.tasks[idx].id.clone();
            if let Some(run) = self.running.remove(&task_id) {
                run.cancel.cancel();
            }
            self.throttler.forget(&task_id);

            // uploading -> paused -> pending，进度归零
            let task = &mut self.tasks[idx];
            if let Err(e) = task.mark_paused().and_then(|_| task.mark_pending()) {
                warn!("任务退回等待队列失败: {}", e);
                continue;
            }
            let snapshot = self.tasks[idx].clone();
            self.notify_status(&snapshot, UploadTaskStatus::Uploading);
        }

        self.persist();
        info!("并发上限调小: {} 个上传任务退回等待队列", excess.len());
    }

    fn clear_where(&mut self, status: UploadTaskStatus) -> usize {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|t| t.status == status);
        self.tasks = kept;

        if removed.is_empty() {
            return 0;
        }

        for task in &removed {
            self.publish(UploadEvent::Deleted {
                task_id: task.id.clone(),
            });
        }
        self.persist();
        info!("已清除 {} 个{}任务", removed.len(), status);
        removed.len()
    }

    /// 按加入顺序启动 pending 任务，直到达到并发上限
    fn schedule(&mut self) {
        if self.paused {
            return;
        }

        loop {
            let uploading = self
                .tasks
                .iter()
                .filter(|t| t.status == UploadTaskStatus::Uploading)
                .count();
            if uploading >= self.max_concurrent {
                break;
            }

            let Some(idx) = self
                .tasks
                .iter()
                .position(|t| t.status == UploadTaskStatus::Pending)
            else {
                break;
            };

            if !self.start_upload(idx) {
                break;
            }
        }
    }

    fn start_upload(&mut self, idx: usize) -> bool {
        let task = &mut self.tasks[idx];
        if let Err(e) = task.mark_uploading() {
            warn!("启动上传任务失败: {}", e);
            return false;
        }

        let snapshot = task.clone();
        let attempt = snapshot.attempts;
        let cancel = CancellationToken::new();

        info!(
            "开始上传任务: {} ({}, 第 {} 次)",
            snapshot.id, snapshot.file.name, attempt
        );

        self.running.insert(
            snapshot.id.clone(),
            RunningUpload {
                attempt,
                cancel: cancel.clone(),
            },
        );

        let job = TransportJob {
            task_id: snapshot.id.clone(),
            upload_url: snapshot.upload_url.clone(),
            file: snapshot.file.clone(),
        };
        self.spawn_worker(job, attempt, cancel);

        self.notify_status(&snapshot, UploadTaskStatus::Pending);
        self.persist();
        true
    }

    fn spawn_worker(&self, job: TransportJob, attempt: u32, cancel: CancellationToken) {
        let transport = self.transport.clone();
        let worker_tx = self.worker_tx.clone();
        let task_id = job.task_id.clone();

        let progress_tx = self.worker_tx.clone();
        let progress_id = task_id.clone();
        let reporter = ProgressReporter::new(job.file.size, cancel.clone(), move |progress| {
            let _ = progress_tx.send(WorkerMessage::Progress {
                task_id: progress_id.clone(),
                attempt,
                progress,
            });
        });

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(TransportError::Cancelled),
                result = transport.upload(job, reporter) => result,
            };
            let _ = worker_tx.send(WorkerMessage::Finished {
                task_id,
                attempt,
                result,
            });
        });
    }

    async fn handle_worker(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Progress {
                task_id,
                attempt,
                progress,
            } => self.on_transport_progress(&task_id, attempt, progress),
            WorkerMessage::Finished {
                task_id,
                attempt,
                result,
            } => self.on_transport_finished(&task_id, attempt, result).await,
        }
    }

    fn is_current(&self, task_id: &str, attempt: u32) -> bool {
        self.running
            .get(task_id)
            .map_or(false, |run| run.attempt == attempt)
    }

    fn on_transport_progress(&mut self, task_id: &str, attempt: u32, progress: u8) {
        if !self.is_current(task_id, attempt) {
            return;
        }
        let Some(idx) = self.tasks.iter().position(|t| t.id == task_id) else {
            return;
        };
        if !self.tasks[idx].update_progress(progress) {
            return;
        }

        let snapshot = self.tasks[idx].clone();
        self.listener.on_progress(&snapshot);

        if self.throttler.should_emit(task_id, snapshot.progress) {
            self.publish(UploadEvent::Progress {
                task_id: task_id.to_string(),
                progress: snapshot.progress,
                overall_progress: overall_progress(&self.tasks),
            });
        }
    }

    async fn on_transport_finished(&mut self, task_id: &str, attempt: u32, result: Result<(), TransportError>) {
        if !self.is_current(task_id, attempt) {
            debug!("忽略过期的传输结果: {} (第 {} 次)", task_id, attempt);
            return;
        }
        self.running.remove(task_id);
        self.throttler.forget(task_id);

        let Some(idx) = self.tasks.iter().position(|t| t.id == task_id) else {
            return;
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.tasks[idx].mark_completed() {
                    warn!("标记任务完成失败: {}", e);
                } else {
                    let snapshot = self.tasks[idx].clone();
                    info!("上传任务完成: {} -> {}", snapshot.file.name, snapshot.public_url);

                    self.notify_status(&snapshot, UploadTaskStatus::Uploading);
                    self.persist();
                    self.publish(UploadEvent::Completed {
                        task_id: snapshot.id.clone(),
                        key: snapshot.key.clone(),
                        public_url: snapshot.public_url.clone(),
                        completed_at: snapshot.completed_at.unwrap_or_default(),
                    });

                    // 等待宿主登记完成后再启动下一个任务
                    if let Err(e) = self.listener.on_complete(&snapshot).await {
                        warn!(
                            "上传成功但宿主登记失败，任务保持已完成: {} ({}): {:#}",
                            snapshot.id, snapshot.key, e
                        );
                    }
                }
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(err) = self.tasks[idx].mark_failed(message.clone()) {
                    warn!("标记任务失败状态失败: {}", err);
                } else {
                    let snapshot = self.tasks[idx].clone();
                    warn!("上传任务失败: {} ({}): {}", snapshot.id, snapshot.file.name, message);

                    self.notify_status(&snapshot, UploadTaskStatus::Uploading);
                    self.persist();
                    self.publish(UploadEvent::Failed {
                        task_id: snapshot.id.clone(),
                        error: message.clone(),
                    });
                    self.listener.on_error(&snapshot, &message);
                }
            }
        }

        self.schedule();
        self.check_drain();
    }

    /// 本批次结束时触发一次 on_all_complete
    fn check_drain(&mut self) {
        if !self.drain_armed || self.tasks.iter().any(|t| t.is_active()) {
            return;
        }
        self.drain_armed = false;

        let completed = self
            .tasks
            .iter()
            .filter(|t| t.status == UploadTaskStatus::Completed)
            .count();
        let failed = self
            .tasks
            .iter()
            .filter(|t| t.status == UploadTaskStatus::Failed)
            .count();

        info!("本批次上传全部结束: 完成 {} 个, 失败 {} 个", completed, failed);
        self.publish(UploadEvent::AllCompleted { completed, failed });
        self.listener.on_all_complete();
    }

    fn abort_all(&mut self) {
        for (task_id, run) in self.running.drain() {
            debug!("中断传输: {}", task_id);
            run.cancel.cancel();
        }
    }

    fn index_of(&self, task_id: &str) -> Result<usize, QueueError> {
        self.tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| QueueError::TaskNotFound(task_id.to_string()))
    }

    fn notify_status(&self, task: &UploadTask, old_status: UploadTaskStatus) {
        debug!("任务状态变更: {} {} -> {}", task.id, old_status, task.status);
        self.listener.on_progress(task);
        self.publish(UploadEvent::StatusChanged {
            task_id: task.id.clone(),
            old_status,
            new_status: task.status,
        });
    }

    fn persist(&self) {
        self.persistence.save(&self.tasks);
    }

    fn publish(&self, event: UploadEvent) {
        // 没有订阅者时发送失败，忽略
        let _ = self.event_tx.send(event);
    }
}

/// 上传队列句柄
///
/// 可以自由克隆；所有克隆都释放后调度协程退出并中断进行中的传输
#[derive(Clone)]
pub struct UploadQueue {
    command_tx: mpsc::UnboundedSender<QueueCommand>,
    event_tx: broadcast::Sender<UploadEvent>,
}

impl UploadQueue {
    /// 创建队列并启动调度协程（必须在 tokio 运行时内调用）
    pub fn new(
        config: &UploadConfig,
        transport: Arc<dyn UploadTransport>,
        persistence: QueuePersistence,
        listener: Arc<dyn UploadQueueListener>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let max_concurrent = config.max_concurrent_tasks.max(1);
        info!("创建上传队列: 最大并发任务数={}", max_concurrent);

        let actor = QueueActor {
            tasks: Vec::new(),
            running: HashMap::new(),
            max_concurrent,
            paused: false,
            drain_armed: false,
            transport,
            listener,
            persistence,
            event_tx: event_tx.clone(),
            worker_tx,
            throttler: ProgressThrottler::new(Duration::from_millis(config.progress_throttle_ms)),
        };
        tokio::spawn(actor.run(command_rx, worker_rx));

        Self { command_tx, event_tx }
    }

    /// 使用 HTTP 传输和配置中的持久化设置创建队列
    pub fn from_config(config: &AppConfig, listener: Arc<dyn UploadQueueListener>) -> Result<Self, TransportError> {
        let transport = Arc::new(HttpTransport::from_config(&config.upload)?);
        let persistence = if config.persistence.enabled {
            QueuePersistence::new(Arc::new(FileSnapshotStore::from_config(&config.persistence)))
        } else {
            QueuePersistence::disabled()
        };
        Ok(Self::new(&config.upload, transport, persistence, listener))
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> QueueCommand) -> Result<T, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(build(reply))
            .map_err(|_| QueueError::Shutdown)?;
        rx.await.map_err(|_| QueueError::Shutdown)
    }

    /// 加入文件，返回新任务 ID（与输入顺序一致）
    pub async fn add_files(&self, entries: Vec<UploadEntry>) -> Result<Vec<String>, QueueError> {
        self.request(|reply| QueueCommand::AddFiles { entries, reply })
            .await
    }

    /// 暂停队列，返回被中断的任务数
    pub async fn pause(&self) -> Result<usize, QueueError> {
        self.request(|reply| QueueCommand::Pause { reply }).await
    }

    /// 恢复队列，返回重新排队的任务数
    pub async fn resume(&self) -> Result<usize, QueueError> {
        self.request(|reply| QueueCommand::Resume { reply }).await
    }

    /// 重试失败的任务
    pub async fn retry(&self, task_id: &str) -> Result<(), QueueError> {
        let task_id = task_id.to_string();
        self.request(|reply| QueueCommand::Retry { task_id, reply })
            .await?
    }

    /// 取消并移除任务（任何状态）
    pub async fn cancel(&self, task_id: &str) -> Result<(), QueueError> {
        let task_id = task_id.to_string();
        self.request(|reply| QueueCommand::Cancel { task_id, reply })
            .await?
    }

    pub async fn get_state(&self) -> Result<QueueState, QueueError> {
        self.request(|reply| QueueCommand::GetState { reply }).await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<UploadTask>, QueueError> {
        let task_id = task_id.to_string();
        self.request(|reply| QueueCommand::GetTask { task_id, reply })
            .await
    }

    /// 清除已完成的任务，返回清除数量
    pub async fn clear_completed(&self) -> Result<usize, QueueError> {
        self.request(|reply| QueueCommand::ClearCompleted { reply })
            .await
    }

    /// 清除失败的任务，返回清除数量
    pub async fn clear_failed(&self) -> Result<usize, QueueError> {
        self.request(|reply| QueueCommand::ClearFailed { reply })
            .await
    }

    /// 调整最大并发数（最小为 1）
    ///
    /// 调大时立即启动等待中的任务；调小时把最晚加入的超额上传任务
    /// 中断并放回等待队列（进度归零），始终不超过上限
    pub async fn set_max_concurrent(&self, max: usize) -> Result<(), QueueError> {
        self.request(|reply| QueueCommand::SetMaxConcurrent { max, reply })
            .await
    }

    /// 订阅队列事件
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }

    /// 停止调度协程并中断所有传输
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.request(|reply| QueueCommand::Shutdown { reply }).await
    }
}
