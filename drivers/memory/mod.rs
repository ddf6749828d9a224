//! In-memory object store / 内存对象存储
//!
//! Used by tests and for trying the CLI without credentials.

mod driver;

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{FsError, FsResult};
use crate::storage::{ClientConnector, ConnectorFactory};

pub use driver::{MemoryClient, MemoryConnector, MemoryStore};

/// 内存后端配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryConfig {
    /// Buckets created empty at startup / 启动时创建的存储桶
    #[serde(default)]
    pub buckets: Vec<String>,
}

/// 内存后端工厂
pub struct MemoryConnectorFactory;

impl ConnectorFactory for MemoryConnectorFactory {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    fn create_connector(&self, options: Value) -> FsResult<Arc<dyn ClientConnector>> {
        let config: MemoryConfig = if options.is_null() {
            MemoryConfig::default()
        } else {
            serde_json::from_value(options).map_err(|e| FsError::Config(format!("配置解析失败: {}", e)))?
        };

        let store = Arc::new(MemoryStore::new());
        for bucket in &config.buckets {
            store.create_bucket(bucket);
        }
        Ok(Arc::new(MemoryConnector::new(store)))
    }
}
