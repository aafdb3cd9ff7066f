//! 队列事件模块
//!
//! - `types.rs`: 上传队列对外广播的事件类型
//! - `throttle.rs`: 进度事件节流，控制广播频率

mod throttle;
mod types;

pub use throttle::*;
pub use types::*;
