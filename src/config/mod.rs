// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 持久化配置
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 20MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    false
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    20 * 1024 * 1024
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

/// 上传请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMethod {
    Put,
    Post,
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 最大同时上传文件数
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    /// 预签名地址使用的请求方法
    #[serde(default = "default_upload_method")]
    pub upload_method: UploadMethod,
    /// 单个上传请求超时（秒），不设置则依赖底层连接自身的超时
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// 进度事件广播最小间隔（毫秒）
    #[serde(default = "default_progress_throttle_ms")]
    pub progress_throttle_ms: u64,
}

fn default_max_concurrent_tasks() -> usize {
    3
}

fn default_upload_method() -> UploadMethod {
    UploadMethod::Put
}

fn default_progress_throttle_ms() -> u64 {
    crate::events::DEFAULT_THROTTLE_INTERVAL_MS
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            upload_method: default_upload_method(),
            request_timeout_secs: None,
            progress_throttle_ms: default_progress_throttle_ms(),
        }
    }
}

impl UploadConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// 持久化配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// 是否保存队列快照
    #[serde(default = "default_persistence_enabled")]
    pub enabled: bool,
    /// 快照保存目录
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// 快照 key（文件名为 `{state_key}.json`）
    #[serde(default = "default_state_key")]
    pub state_key: String,
}

fn default_persistence_enabled() -> bool {
    true
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_state_key() -> String {
    "photopro-upload-queue".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: default_persistence_enabled(),
            state_dir: default_state_dir(),
            state_key: default_state_key(),
        }
    }
}

impl AppConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.upload.max_concurrent_tasks == 0 {
            anyhow::bail!("upload.max_concurrent_tasks 必须大于 0");
        }
        if self.persistence.enabled && self.persistence.state_key.trim().is_empty() {
            anyhow::bail!("persistence.state_key 不能为空");
        }
        Ok(())
    }

    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate().context("配置校验失败")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        self.validate().context("保存配置失败")?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);

        Ok(())
    }

    /// 加载或创建默认配置
    ///
    /// 只有文件不存在时才写入默认配置；已有文件解析或校验失败时保留原文件
    pub async fn load_or_default(path: &str) -> Self {
        if !fs::try_exists(path).await.unwrap_or(false) {
            tracing::info!("配置文件不存在，创建默认配置: {}", path);
            let default_config = Self::default();
            if let Err(e) = default_config.save_to_file(path).await {
                tracing::error!("保存默认配置失败: {}", e);
            }
            return default_config;
        }

        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::error!("配置文件无效，本次使用默认配置（原文件未修改）: {:#}", e);
                Self::default()
            }
        }
    }
}
