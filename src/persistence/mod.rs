//! 队列快照持久化模块
//!
//! 保存上传队列的任务列表，让下一次会话能够提示用户"上次有未完成的上传"。
//!
//! ## 设计原则
//!
//! 1. **只做提示，不做恢复**: 文件内容无法序列化，加载出的任务只用于展示和重新选择文件，
//!    队列不会自动重新上传
//! 2. **存储可替换**: `SnapshotStore` 返回显式的 `Result`，便于测试
//! 3. **尽力而为**: `QueuePersistence` 吞掉所有存储错误，只记录日志，不影响上传
//!
//! ## 文件结构
//!
//! ```text
//! state/
//! └── {state_key}.json    # { "queue": [UploadTask...] }
//! ```

pub mod adapter;
pub mod store;

pub use adapter::QueuePersistence;
pub use store::{
    FileSnapshotStore, MemorySnapshotStore, NoopSnapshotStore, PersistedQueue, SnapshotStore,
};
