// 传输层
//
// 每次调用只负责一个任务：把整个文件一次性 PUT/POST 到预签名地址，
// 并按已发送字节数上报进度。并发数量由上传队列控制。
//
// 预签名地址是一次性上传目标，不支持分片和断点续传。

use crate::config::{UploadConfig, UploadMethod};
use crate::error::TransportError;
use crate::uploader::{FileSource, UploadFile};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 读取文件 / 切分内存数据时的块大小
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// 错误响应体保留的最大长度
const MAX_ERROR_BODY_LEN: usize = 256;

/// 一次传输所需的信息
#[derive(Debug, Clone)]
pub struct TransportJob {
    pub task_id: String,
    pub upload_url: String,
    pub file: UploadFile,
}

/// 进度上报器
///
/// 把已发送字节数换算为 0-100 的整数百分比，只上报严格递增的值；
/// 取消令牌触发后不再上报
pub struct ProgressReporter {
    total: u64,
    sent: u64,
    last: u8,
    cancel: CancellationToken,
    sink: Arc<dyn Fn(u8) + Send + Sync>,
}

impl ProgressReporter {
    pub fn new<F>(total: u64, cancel: CancellationToken, sink: F) -> Self
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        Self {
            total,
            sent: 0,
            last: 0,
            cancel,
            sink: Arc::new(sink),
        }
    }

    /// 累加已发送字节
    pub fn advance(&mut self, bytes: u64) {
        self.sent = self.sent.saturating_add(bytes);
        let percent = if self.total == 0 {
            100
        } else {
            (self.sent.min(self.total) as u128 * 100 / self.total as u128) as u8
        };
        self.report(percent);
    }

    /// 直接上报百分比
    pub fn report(&mut self, percent: u8) {
        if self.cancel.is_cancelled() {
            return;
        }
        let percent = percent.min(100);
        if percent > self.last {
            self.last = percent;
            (self.sink)(percent);
        }
    }

    pub fn percent(&self) -> u8 {
        self.last
    }

    pub fn bytes_sent(&self) -> u64 {
        self.sent
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// 传输层抽象
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// 上传一个文件，成功表示目标端已接收全部内容
    async fn upload(&self, job: TransportJob, progress: ProgressReporter) -> Result<(), TransportError>;
}

type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// 基于 reqwest 的 HTTP 传输
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    method: UploadMethod,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(method: UploadMethod, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(client, method, timeout))
    }

    pub fn with_client(client: reqwest::Client, method: UploadMethod, timeout: Option<Duration>) -> Self {
        Self {
            client,
            method,
            timeout,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Result<Self, TransportError> {
        Self::new(config.upload_method, config.request_timeout())
    }

    async fn open_body(source: &FileSource) -> Result<ByteStream, TransportError> {
        match source {
            FileSource::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Box::pin(ReaderStream::with_capacity(file, STREAM_CHUNK_SIZE)))
            }
            FileSource::Memory(data) => {
                let mut chunks = Vec::with_capacity(data.len() / STREAM_CHUNK_SIZE + 1);
                let mut offset = 0;
                while offset < data.len() {
                    let end = (offset + STREAM_CHUNK_SIZE).min(data.len());
                    chunks.push(Ok(data.slice(offset..end)));
                    offset = end;
                }
                Ok(Box::pin(futures::stream::iter(chunks)))
            }
        }
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn upload(&self, job: TransportJob, mut progress: ProgressReporter) -> Result<(), TransportError> {
        let source = job.file.source.as_ref().ok_or(TransportError::MissingSource)?;
        let body = Self::open_body(source).await?;

        debug!(
            "开始传输: task={}, file={}, size={}, method={:?}",
            job.task_id, job.file.name, job.file.size, self.method
        );

        let counted = body.map(move |chunk| {
            if let Ok(bytes) = &chunk {
                progress.advance(bytes.len() as u64);
            }
            chunk
        });

        let request = match self.method {
            UploadMethod::Put => self.client.put(&job.upload_url),
            UploadMethod::Post => self.client.post(&job.upload_url),
        };

        let mut request = request
            .header(CONTENT_TYPE, job.file.content_type.as_str())
            .header(CONTENT_LENGTH, job.file.size)
            .body(reqwest::Body::wrap_stream(counted));

        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY_LEN {
                let mut cut = MAX_ERROR_BODY_LEN;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            warn!("目标端拒绝上传: task={}, status={}", job.task_id, status);
            return Err(TransportError::Status {
                code: status.as_u16(),
                body,
            });
        }

        debug!("传输完成: task={}, status={}", job.task_id, status);
        Ok(())
    }
}
