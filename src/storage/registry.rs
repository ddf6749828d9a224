use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::ClientConnector;
use crate::error::{FsError, FsResult};

/// Connector factory trait / 连接器工厂 trait
pub trait ConnectorFactory: Send + Sync {
    /// Backend type name used in host config / 后端类型名称
    fn backend_type(&self) -> &'static str;

    /// Build a connector from backend-specific options / 根据配置创建连接器
    fn create_connector(&self, options: Value) -> FsResult<Arc<dyn ClientConnector>>;
}

/// Backend type -> factory / 连接器注册表
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    factories: Arc<RwLock<HashMap<String, Arc<dyn ConnectorFactory>>>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register connector factory / 注册连接器工厂
    pub fn register_factory(&self, factory: Arc<dyn ConnectorFactory>) {
        let backend_type = factory.backend_type().to_string();
        self.factories.write().insert(backend_type.clone(), factory);
        tracing::debug!("Connector factory registered: {}", backend_type);
    }

    pub fn backend_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Create connector for a backend type / 创建连接器
    pub fn create_connector(&self, backend_type: &str, options: Value) -> FsResult<Arc<dyn ClientConnector>> {
        let factory = self
            .factories
            .read()
            .get(backend_type)
            .cloned()
            .ok_or_else(|| FsError::Config(format!("backend type not found: {}", backend_type)))?;

        match factory.create_connector(options) {
            Ok(connector) => {
                tracing::debug!("Connector created: {}", backend_type);
                Ok(connector)
            }
            Err(e) => {
                tracing::error!("Connector creation failed: {} - {}", backend_type, e);
                Err(e)
            }
        }
    }
}
