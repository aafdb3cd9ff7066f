//! 测试辅助：脚本化传输层和记录型监听器

use crate::error::TransportError;
use crate::uploader::{
    ProgressReporter, QueueState, TransportJob, UploadEntry, UploadFile, UploadQueue, UploadQueueListener,
    UploadTask, UploadTaskStatus, UploadTransport,
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// 传输层和监听器共用的事件记录，用于断言先后顺序
pub(crate) type Journal = Arc<Mutex<Vec<String>>>;

pub(crate) enum Step {
    Progress(u8),
    Succeed,
    Fail(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// 由测试逐步驱动
    Manual,
    /// 上报 50/100 后立即成功
    AutoSucceed,
}

struct InFlight<'a> {
    current: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) struct ScriptedTransport {
    mode: Mode,
    controls: Mutex<HashMap<String, mpsc::UnboundedSender<Step>>>,
    started_tx: mpsc::UnboundedSender<String>,
    started_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    journal: Journal,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedTransport {
    fn with_mode(mode: Mode, journal: Journal) -> Arc<Self> {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            mode,
            controls: Mutex::new(HashMap::new()),
            started_tx,
            started_rx: tokio::sync::Mutex::new(started_rx),
            journal,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub(crate) fn manual(journal: Journal) -> Arc<Self> {
        Self::with_mode(Mode::Manual, journal)
    }

    pub(crate) fn auto(journal: Journal) -> Arc<Self> {
        Self::with_mode(Mode::AutoSucceed, journal)
    }

    /// 等待下一个开始传输的任务
    pub(crate) async fn next_started(&self) -> String {
        let mut rx = self.started_rx.lock().await;
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("等待传输开始超时")
            .expect("传输通知通道已关闭")
    }

    fn send(&self, task_id: &str, step: Step) -> bool {
        self.controls
            .lock()
            .get(task_id)
            .map(|tx| tx.send(step).is_ok())
            .unwrap_or(false)
    }

    pub(crate) fn progress(&self, task_id: &str, percent: u8) -> bool {
        self.send(task_id, Step::Progress(percent))
    }

    pub(crate) fn succeed(&self, task_id: &str) -> bool {
        self.send(task_id, Step::Succeed)
    }

    pub(crate) fn fail(&self, task_id: &str, error: &str) -> bool {
        self.send(task_id, Step::Fail(error.to_string()))
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn started_names(&self) -> Vec<String> {
        self.journal
            .lock()
            .iter()
            .filter_map(|line| line.strip_prefix("start:").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl UploadTransport for ScriptedTransport {
    async fn upload(&self, job: TransportJob, mut progress: ProgressReporter) -> Result<(), TransportError> {
        let _guard = InFlight::enter(&self.in_flight, &self.peak);
        self.journal.lock().push(format!("start:{}", job.file.name));

        if self.mode == Mode::AutoSucceed {
            tokio::task::yield_now().await;
            progress.report(50);
            tokio::task::yield_now().await;
            progress.report(100);
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.controls.lock().insert(job.task_id.clone(), tx);
        let _ = self.started_tx.send(job.task_id.clone());

        while let Some(step) = rx.recv().await {
            match step {
                Step::Progress(p) => progress.report(p),
                Step::Succeed => return Ok(()),
                Step::Fail(msg) => return Err(TransportError::Network(msg)),
            }
        }
        Err(TransportError::Cancelled)
    }
}

#[derive(Default)]
pub(crate) struct RecordingListener {
    journal: Journal,
    progress: Mutex<Vec<(String, UploadTaskStatus, u8)>>,
    errors: Mutex<Vec<(String, String)>>,
    completed: Mutex<Vec<String>>,
    all_complete: AtomicUsize,
    reject_registration: AtomicBool,
}

impl RecordingListener {
    pub(crate) fn new(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            journal,
            ..Default::default()
        })
    }

    /// 之后的 on_complete 都返回错误
    pub(crate) fn reject_registration(&self) {
        self.reject_registration.store(true, Ordering::SeqCst);
    }

    pub(crate) fn progress_of(&self, task_id: &str) -> Vec<(UploadTaskStatus, u8)> {
        self.progress
            .lock()
            .iter()
            .filter(|(id, _, _)| id == task_id)
            .map(|(_, status, p)| (*status, *p))
            .collect()
    }

    pub(crate) fn progress_calls(&self) -> usize {
        self.progress.lock().len()
    }

    pub(crate) fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().clone()
    }

    pub(crate) fn completed(&self) -> Vec<String> {
        self.completed.lock().clone()
    }

    pub(crate) fn all_complete_count(&self) -> usize {
        self.all_complete.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadQueueListener for RecordingListener {
    fn on_progress(&self, task: &UploadTask) {
        self.progress
            .lock()
            .push((task.id.clone(), task.status, task.progress));
    }

    async fn on_complete(&self, task: &UploadTask) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        self.journal.lock().push(format!("complete:{}", task.file.name));
        self.completed.lock().push(task.id.clone());
        if self.reject_registration.load(Ordering::SeqCst) {
            anyhow::bail!("登记资源失败: {}", task.key);
        }
        Ok(())
    }

    fn on_error(&self, task: &UploadTask, error: &str) {
        self.errors.lock().push((task.id.clone(), error.to_string()));
    }

    fn on_all_complete(&self) {
        self.all_complete.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn entry(name: &str, size: usize) -> UploadEntry {
    UploadEntry {
        file: UploadFile::from_bytes(name, "image/jpeg", Bytes::from(vec![0u8; size])),
        upload_url: format!("https://uploads.example.com/{name}?sig=abc"),
        public_url: format!("https://cdn.example.com/{name}"),
        key: format!("galleries/g1/{name}"),
    }
}

/// 轮询队列状态直到满足条件
pub(crate) async fn wait_for<F>(queue: &UploadQueue, mut cond: F) -> QueueState
where
    F: FnMut(&QueueState) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let state = queue.get_state().await.expect("队列已关闭");
        if cond(&state) {
            return state;
        }
        if Instant::now() > deadline {
            panic!("等待队列状态超时: {:?}", state);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// 轮询任意条件
pub(crate) async fn eventually<F>(mut cond: F)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        if Instant::now() > deadline {
            panic!("等待条件超时");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
