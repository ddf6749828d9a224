//! Host configuration module / 主机配置模块
//!
//! One JSON file describes the backend to connect to. The backend-specific
//! `options` object is handed to that backend's connector factory untouched.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FsError, FsResult};
use crate::fs::provider::DEFAULT_UPLOAD_QUEUE_DEPTH;

/// Host configuration / 主机配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Backend type, e.g. "s3" or "memory" / 后端类型
    pub backend: String,
    /// Directory relative paths resolve against / 默认路径
    #[serde(default = "default_path")]
    pub default_path: String,
    /// Chunks queued ahead of each upload / 上传队列深度
    #[serde(default = "default_upload_queue_depth")]
    pub upload_queue_depth: usize,
    /// Backend-specific options / 后端配置
    #[serde(default)]
    pub options: Value,
}

fn default_path() -> String {
    "/".to_string()
}

fn default_upload_queue_depth() -> usize {
    DEFAULT_UPLOAD_QUEUE_DEPTH
}

impl HostConfig {
    pub fn new(backend: impl Into<String>, options: Value) -> Self {
        Self {
            backend: backend.into(),
            default_path: default_path(),
            upload_queue_depth: default_upload_queue_depth(),
            options,
        }
    }
}

/// Config file in the working directory / 默认配置文件路径
pub fn default_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("objfs.json")
}

/// Load configuration from file / 加载配置文件
pub fn load_config(path: impl AsRef<Path>) -> FsResult<HostConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| FsError::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
    let config = parse_config(&content)?;
    tracing::info!("Loaded configuration from {:?}", path);
    Ok(config)
}

pub fn parse_config(content: &str) -> FsResult<HostConfig> {
    let config: HostConfig = serde_json::from_str(content)
        .map_err(|e| FsError::Config(format!("Failed to parse config file: {}", e)))?;
    if config.backend.trim().is_empty() {
        return Err(FsError::Config("backend must not be empty".to_string()));
    }
    Ok(config)
}
