pub mod config;
pub mod error;
pub mod fs;
pub mod storage;
pub mod utils;

// Backend modules (point to project root drivers via path attribute) / 后端模块
#[path = "../drivers/mod.rs"]
pub mod drivers;

pub use error::{FsError, FsResult};
pub use fs::{ObjectFileSystem, ObjectPath};

/// Registry with every built-in backend / 注册所有内置后端
pub fn default_registry() -> storage::ConnectorRegistry {
    let registry = storage::ConnectorRegistry::new();
    drivers::register_all(&registry);
    registry
}
