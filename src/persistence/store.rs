//! 快照存储实现
//!
//! 快照为 JSON 格式，固定 key 对应固定文件：
//! ```json
//! { "queue": [ { "id": "...", "status": "pending", ... } ] }
//! ```

use crate::config::PersistenceConfig;
use crate::error::PersistenceError;
use crate::uploader::UploadTask;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// 快照文件扩展名
const SNAPSHOT_EXTENSION: &str = "json";

/// 持久化的队列快照
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedQueue {
    pub queue: Vec<UploadTask>,
}

/// 快照存储能力
///
/// 同步接口：快照很小，写入在 actor 的两次 I/O 等待之间完成
pub trait SnapshotStore: Send + Sync {
    /// 覆盖保存快照
    fn save(&self, snapshot: &PersistedQueue) -> Result<(), PersistenceError>;

    /// 读取上次保存的快照，不存在时返回 `None`
    fn load(&self) -> Result<Option<PersistedQueue>, PersistenceError>;

    /// 删除快照
    fn clear(&self) -> Result<(), PersistenceError>;
}

/// 基于本地文件的快照存储
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// 快照路径：`{dir}/{key}.json`
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.{}", key, SNAPSHOT_EXTENSION)),
        }
    }

    pub fn from_config(config: &PersistenceConfig) -> Self {
        Self::new(&config.state_dir, &config.state_key)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, snapshot: &PersistedQueue) -> Result<(), PersistenceError> {
        if let Some(dir) = self.path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
                debug!("已创建快照目录: {:?}", dir);
            }
        }

        // 先写入临时文件，再原子重命名（防止写入中断导致文件损坏）
        let temp_path = self.path.with_extension("json.tmp");

        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, snapshot)?;
        writer.flush()?;
        drop(writer);

        fs::rename(&temp_path, &self.path)?;

        debug!("已保存队列快照: {:?} ({} 个任务)", self.path, snapshot.queue.len());
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedQueue>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path)?;
        let snapshot: PersistedQueue = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(snapshot))
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 内存快照存储（测试或无本地磁盘的部署）
///
/// 克隆后共享同一份数据，可模拟"重新加载页面"
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入原始内容（用于模拟损坏的快照）
    pub fn put_raw(&self, raw: impl Into<String>) {
        *self.slot.lock() = Some(raw.into());
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: &PersistedQueue) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(snapshot)?;
        *self.slot.lock() = Some(raw);
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedQueue>, PersistenceError> {
        match self.slot.lock().as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// 关闭持久化时使用
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSnapshotStore;

impl SnapshotStore for NoopSnapshotStore {
    fn save(&self, _snapshot: &PersistedQueue) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedQueue>, PersistenceError> {
        Ok(None)
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploader::UploadFile;
    use bytes::Bytes;
    use tempfile::TempDir;

    fn snapshot_with(n: usize) -> PersistedQueue {
        let queue = (0..n)
            .map(|i| {
                UploadTask::new(
                    UploadFile::from_bytes(format!("img_{i}.jpg"), "image/jpeg", Bytes::from_static(b"abc")),
                    format!("https://uploads.example.com/{i}"),
                    format!("https://cdn.example.com/{i}"),
                    format!("k/{i}"),
                )
            })
            .collect();
        PersistedQueue { queue }
    }

    #[test]
    fn test_file_store_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested"), "queue");

        assert!(store.load().unwrap().is_none());

        store.save(&snapshot_with(2)).unwrap();
        assert!(store.path().ends_with("queue.json"));
        assert!(!store.path().with_extension("json.tmp").exists());

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.queue.len(), 2);
        assert_eq!(loaded.queue[1].key, "k/1");

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // 重复删除不报错
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path(), "queue");
        fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(store.load(), Err(PersistenceError::Serde(_))));
    }

    #[test]
    fn test_snapshot_shape() {
        let json = serde_json::to_value(snapshot_with(1)).unwrap();
        assert!(json["queue"].is_array());
        assert_eq!(json["queue"][0]["status"], "pending");
        assert!(json["queue"][0]["file"].get("source").is_none());
    }

    #[test]
    fn test_memory_store_shared_between_clones() {
        let store = MemorySnapshotStore::new();
        let reloaded = store.clone();

        store.save(&snapshot_with(3)).unwrap();
        assert_eq!(reloaded.load().unwrap().unwrap().queue.len(), 3);

        reloaded.put_raw("garbage");
        assert!(store.load().is_err());
    }
}
