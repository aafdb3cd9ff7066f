//! 进度事件节流器
//!
//! 控制广播进度事件的频率，避免大量小文件并发上传时产生事件风暴。
//! 只作用于 `UploadEvent::Progress` 广播，监听器回调不受影响。

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// 默认节流间隔（毫秒）
pub const DEFAULT_THROTTLE_INTERVAL_MS: u64 = 200;

/// 按任务节流的进度事件节流器
///
/// 由队列 actor 独占使用，因此不需要原子操作
#[derive(Debug)]
pub struct ProgressThrottler {
    /// 节流间隔
    interval: Duration,
    /// 每个任务上次发布的时间
    last_emit: HashMap<String, Instant>,
}

impl ProgressThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: HashMap::new(),
        }
    }

    /// 使用指定毫秒间隔创建节流器
    pub fn with_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }

    /// 检查是否应该发布该任务的进度事件
    ///
    /// 首次和 100% 总是发布
    pub fn should_emit(&mut self, task_id: &str, progress: u8) -> bool {
        let now = Instant::now();

        if progress >= 100 {
            self.last_emit.insert(task_id.to_string(), now);
            return true;
        }

        match self.last_emit.get_mut(task_id) {
            Some(last) if now.duration_since(*last) < self.interval => false,
            Some(last) => {
                *last = now;
                true
            }
            None => {
                self.last_emit.insert(task_id.to_string(), now);
                true
            }
        }
    }

    /// 任务离开上传中状态时清除记录
    pub fn forget(&mut self, task_id: &str) {
        self.last_emit.remove(task_id);
    }

    pub fn tracked(&self) -> usize {
        self.last_emit.len()
    }
}

impl Default for ProgressThrottler {
    fn default() -> Self {
        Self::with_millis(DEFAULT_THROTTLE_INTERVAL_MS)
    }
}
