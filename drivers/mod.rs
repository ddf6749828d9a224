// Backend package / 后端包
pub mod memory;
pub mod s3;

use std::sync::Arc;

use crate::storage::ConnectorRegistry;

/// Register all backends / 注册所有后端
pub fn register_all(registry: &ConnectorRegistry) {
    // Register S3 compatible backend / 注册S3兼容对象存储
    registry.register_factory(Arc::new(s3::S3ConnectorFactory));
    // Register in-memory backend / 注册内存后端
    registry.register_factory(Arc::new(memory::MemoryConnectorFactory));
}
