//! 宿主集成
//!
//! 上传地址分配和资源登记由宿主的后端完成，这里只定义契约和调用处的胶水代码：
//!
//! 1. `enqueue_with_allocation`: 先向后端申请预签名地址，再把文件加入队列
//! 2. `RegisteringListener`: 上传成功后把对象 key 登记为资源，再转发给宿主自己的监听器

use crate::uploader::{UploadEntry, UploadFile, UploadQueue, UploadQueueListener, UploadTask};
use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// 申请上传地址时提交的文件信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

impl From<&UploadFile> for FileDescriptor {
    fn from(file: &UploadFile) -> Self {
        Self {
            filename: file.name.clone(),
            content_type: file.content_type.clone(),
            size: file.size,
        }
    }
}

/// 后端分配的上传目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDestination {
    pub upload_url: String,
    pub public_url: String,
    pub key: String,
}

/// 上传地址分配
#[async_trait]
pub trait DestinationAllocator: Send + Sync {
    /// 按输入顺序返回每个文件的上传目标
    async fn allocate(&self, files: &[FileDescriptor]) -> Result<Vec<UploadDestination>>;
}

/// 登记上传结果所需的信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRegistration {
    pub key: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl AssetRegistration {
    pub fn from_task(task: &UploadTask) -> Self {
        Self {
            key: task.key.clone(),
            filename: task.file.name.clone(),
            mime_type: task.file.content_type.clone(),
            size_bytes: task.file.size,
        }
    }
}

/// 登记后的资源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredAsset {
    pub id: String,
    pub url: String,
}

/// 资源登记
#[async_trait]
pub trait AssetRegistrar: Send + Sync {
    async fn register(&self, asset: AssetRegistration) -> Result<RegisteredAsset>;
}

/// 申请上传地址并加入队列
///
/// 分配失败或数量不一致时不会创建任何任务
pub async fn enqueue_with_allocation(
    queue: &UploadQueue,
    allocator: &dyn DestinationAllocator,
    files: Vec<UploadFile>,
) -> Result<Vec<String>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let descriptors: Vec<FileDescriptor> = files.iter().map(FileDescriptor::from).collect();
    let destinations = allocator
        .allocate(&descriptors)
        .await
        .with_context(|| format!("申请上传地址失败: {} 个文件", descriptors.len()))?;

    ensure!(
        destinations.len() == files.len(),
        "上传地址数量不匹配: 请求 {} 个, 返回 {} 个",
        files.len(),
        destinations.len()
    );

    let entries = files
        .into_iter()
        .zip(destinations)
        .map(|(file, dest)| UploadEntry {
            file,
            upload_url: dest.upload_url,
            public_url: dest.public_url,
            key: dest.key,
        })
        .collect();

    let ids = queue.add_files(entries).await.context("加入上传队列失败")?;
    info!("已申请上传地址并加入队列: {} 个文件", ids.len());
    Ok(ids)
}

/// 上传成功后自动登记资源的监听器
pub struct RegisteringListener<R, L: ?Sized> {
    registrar: R,
    inner: Arc<L>,
}

impl<R, L: ?Sized> RegisteringListener<R, L>
where
    R: AssetRegistrar,
    L: UploadQueueListener,
{
    pub fn new(registrar: R, inner: Arc<L>) -> Self {
        Self { registrar, inner }
    }
}

#[async_trait]
impl<R, L> UploadQueueListener for RegisteringListener<R, L>
where
    R: AssetRegistrar,
    L: UploadQueueListener + ?Sized,
{
    fn on_progress(&self, task: &UploadTask) {
        self.inner.on_progress(task);
    }

    async fn on_complete(&self, task: &UploadTask) -> Result<()> {
        let registered = self
            .registrar
            .register(AssetRegistration::from_task(task))
            .await
            .with_context(|| format!("登记资源失败: {}", task.key));

        match &registered {
            Ok(asset) => info!("资源已登记: {} -> {}", task.key, asset.id),
            Err(e) => warn!("资源登记失败，文件已在存储中: {:#}", e),
        }

        let delegated = self.inner.on_complete(task).await;
        registered?;
        delegated
    }

    fn on_error(&self, task: &UploadTask, error: &str) {
        self.inner.on_error(task, error);
    }

    fn on_all_complete(&self) {
        self.inner.on_all_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use crate::persistence::QueuePersistence;
    use crate::uploader::testing::{eventually, journal, wait_for, RecordingListener, ScriptedTransport};
    use crate::uploader::UploadTaskStatus;
    use bytes::Bytes;
    use parking_lot::Mutex;

    struct FakeAllocator {
        drop_one: bool,
        seen: Mutex<Vec<FileDescriptor>>,
    }

    impl FakeAllocator {
        fn new(drop_one: bool) -> Self {
            Self {
                drop_one,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DestinationAllocator for FakeAllocator {
        async fn allocate(&self, files: &[FileDescriptor]) -> Result<Vec<UploadDestination>> {
            self.seen.lock().extend_from_slice(files);
            let mut out: Vec<UploadDestination> = files
                .iter()
                .map(|f| UploadDestination {
                    upload_url: format!("https://uploads.example.com/{}?sig=1", f.filename),
                    public_url: format!("https://cdn.example.com/{}", f.filename),
                    key: format!("galleries/g1/{}", f.filename),
                })
                .collect();
            if self.drop_one {
                out.pop();
            }
            Ok(out)
        }
    }

    struct DownAllocator;

    #[async_trait]
    impl DestinationAllocator for DownAllocator {
        async fn allocate(&self, _files: &[FileDescriptor]) -> Result<Vec<UploadDestination>> {
            anyhow::bail!("503 Service Unavailable")
        }
    }

    struct FakeRegistrar {
        fail: bool,
        registered: Mutex<Vec<AssetRegistration>>,
    }

    #[async_trait]
    impl AssetRegistrar for FakeRegistrar {
        async fn register(&self, asset: AssetRegistration) -> Result<RegisteredAsset> {
            if self.fail {
                anyhow::bail!("duplicate key");
            }
            let id = format!("asset-{}", self.registered.lock().len() + 1);
            let url = format!("https://cdn.example.com/{}", asset.key);
            self.registered.lock().push(asset);
            Ok(RegisteredAsset { id, url })
        }
    }

    fn files() -> Vec<UploadFile> {
        vec![
            UploadFile::from_bytes("a.jpg", "image/jpeg", Bytes::from_static(b"aaaa")),
            UploadFile::from_bytes("b.png", "image/png", Bytes::from_static(b"bb")),
        ]
    }

    fn queue_with(listener: Arc<dyn UploadQueueListener>) -> UploadQueue {
        UploadQueue::new(
            &UploadConfig::default(),
            ScriptedTransport::auto(journal()),
            QueuePersistence::disabled(),
            listener,
        )
    }

    #[tokio::test]
    async fn test_enqueue_uses_allocated_destinations() {
        let queue = queue_with(RecordingListener::new(journal()));
        let allocator = FakeAllocator::new(false);

        let ids = enqueue_with_allocation(&queue, &allocator, files()).await.unwrap();
        assert_eq!(ids.len(), 2);

        let seen = allocator.seen.lock().clone();
        assert_eq!(seen[0].filename, "a.jpg");
        assert_eq!(seen[1].content_type, "image/png");
        assert_eq!(seen[1].size, 2);

        let task = queue.get_task(&ids[1]).await.unwrap().unwrap();
        assert_eq!(task.key, "galleries/g1/b.png");
        assert_eq!(task.public_url, "https://cdn.example.com/b.png");
    }

    #[tokio::test]
    async fn test_enqueue_count_mismatch_creates_nothing() {
        let queue = queue_with(RecordingListener::new(journal()));

        let err = enqueue_with_allocation(&queue, &FakeAllocator::new(true), files())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("数量不匹配"));
        assert_eq!(queue.get_state().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_enqueue_allocation_failure() {
        let queue = queue_with(RecordingListener::new(journal()));

        let err = enqueue_with_allocation(&queue, &DownAllocator, files())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("503"));
        assert_eq!(queue.get_state().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_registering_listener_registers_and_delegates() {
        let inner = RecordingListener::new(journal());
        let listener = Arc::new(RegisteringListener::new(
            FakeRegistrar {
                fail: false,
                registered: Mutex::new(Vec::new()),
            },
            inner.clone(),
        ));
        let queue = queue_with(listener.clone());

        let ids = enqueue_with_allocation(&queue, &FakeAllocator::new(false), files())
            .await
            .unwrap();
        wait_for(&queue, |s| s.completed == 2).await;
        eventually(|| inner.all_complete_count() == 1).await;

        let registered = listener.registrar.registered.lock().clone();
        assert_eq!(registered.len(), 2);
        assert!(registered.iter().any(|a| a.key == "galleries/g1/a.jpg" && a.mime_type == "image/jpeg"));
        assert_eq!(registered.iter().find(|a| a.filename == "a.jpg").unwrap().size_bytes, 4);

        let mut completed = inner.completed();
        completed.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(completed, expected);
    }

    #[tokio::test]
    async fn test_registration_failure_keeps_task_completed() {
        let inner = RecordingListener::new(journal());
        let listener = Arc::new(RegisteringListener::new(
            FakeRegistrar {
                fail: true,
                registered: Mutex::new(Vec::new()),
            },
            inner.clone(),
        ));
        let queue = queue_with(listener);

        let ids = enqueue_with_allocation(&queue, &FakeAllocator::new(false), files())
            .await
            .unwrap();
        let state = wait_for(&queue, |s| s.completed == 2).await;

        assert!(state.tasks.iter().all(|t| t.status == UploadTaskStatus::Completed));
        assert_eq!(inner.completed().len(), ids.len());
        assert!(inner.errors().is_empty());
    }
}
