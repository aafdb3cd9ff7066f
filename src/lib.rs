// PhotoPro 批量上传客户端核心库
// 预签名地址直传、有界并发队列、暂停/恢复/重试、会话快照

// 配置管理模块
pub mod config;

// 错误类型
pub mod error;

// 队列事件（广播给 UI）
pub mod events;

// 宿主集成（地址分配、资源登记）
pub mod host;

// 日志系统
pub mod logging;

// 队列快照持久化
pub mod persistence;

// 上传队列模块
pub mod uploader;

// 导出常用类型
pub use config::AppConfig;
pub use error::{PersistenceError, QueueError, TransportError};
pub use events::UploadEvent;
pub use host::{enqueue_with_allocation, AssetRegistrar, DestinationAllocator, RegisteringListener};
pub use persistence::{FileSnapshotStore, QueuePersistence, SnapshotStore};
pub use uploader::{
    HttpTransport, QueueState, UploadEntry, UploadFile, UploadQueue, UploadQueueListener, UploadTask,
    UploadTaskStatus, UploadTransport,
};
