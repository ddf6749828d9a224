//! Session file system / 会话文件系统
//!
//! Owns the client handler and provider of one connected session. Closing the
//! file system, or dropping it, shuts every backend client down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncReadExt;

use super::channel::OpenOption;
use super::path::{DirEntry, FileAttributes, ObjectPath};
use super::provider::{FileSystemProvider, DEFAULT_UPLOAD_QUEUE_DEPTH};
use crate::config::HostConfig;
use crate::error::{FsError, FsResult};
use crate::storage::{BucketInfo, ClientConnector, ClientHandler, ConnectorRegistry};

/// Session options / 会话选项
#[derive(Debug, Clone)]
pub struct FileSystemOptions {
    pub default_path: String,
    pub upload_queue_depth: usize,
}

impl Default for FileSystemOptions {
    fn default() -> Self {
        Self {
            default_path: "/".to_string(),
            upload_queue_depth: DEFAULT_UPLOAD_QUEUE_DEPTH,
        }
    }
}

impl From<&HostConfig> for FileSystemOptions {
    fn from(config: &HostConfig) -> Self {
        Self {
            default_path: config.default_path.clone(),
            upload_queue_depth: config.upload_queue_depth,
        }
    }
}

pub struct ObjectFileSystem {
    handler: Arc<ClientHandler>,
    provider: FileSystemProvider,
    default_path: ObjectPath,
    open: AtomicBool,
}

impl ObjectFileSystem {
    /// Fetch the bucket list and open a session / 连接并创建会话
    pub async fn connect(connector: Arc<dyn ClientConnector>, options: FileSystemOptions) -> FsResult<Self> {
        let handler = Arc::new(ClientHandler::connect(connector).await?);
        let provider = FileSystemProvider::new(handler.clone()).with_upload_queue_depth(options.upload_queue_depth);
        let default_path = ObjectPath::root().resolve(&options.default_path).normalize();

        tracing::info!(
            "{}: file system opened, {} buckets, default path {}",
            handler.backend_name(),
            handler.buckets().len(),
            default_path
        );

        Ok(Self {
            handler,
            provider,
            default_path,
            open: AtomicBool::new(true),
        })
    }

    /// Build the backend named in `config` and connect / 根据配置连接
    pub async fn from_config(config: &HostConfig, registry: &ConnectorRegistry) -> FsResult<Self> {
        let connector = registry.create_connector(&config.backend, config.options.clone())?;
        Self::connect(connector, FileSystemOptions::from(config)).await
    }

    /// Resolve a user path against the default path / 解析路径
    pub fn get_path(&self, path: &str) -> ObjectPath {
        self.default_path.resolve(path).normalize()
    }

    pub fn root_directories(&self) -> Vec<ObjectPath> {
        vec![ObjectPath::root()]
    }

    pub fn default_path(&self) -> &ObjectPath {
        &self.default_path
    }

    pub fn separator(&self) -> &'static str {
        super::path::SEPARATOR
    }

    pub fn provider(&self) -> &FileSystemProvider {
        &self.provider
    }

    pub fn buckets(&self) -> &[BucketInfo] {
        self.handler.buckets()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Close the session; later calls are no-ops / 关闭会话
    pub fn close(&self) {
        if self
            .open
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.handler.close();
            tracing::info!("{}: file system closed", self.handler.backend_name());
        }
    }

    pub async fn list(&self, dir: &ObjectPath) -> FsResult<Vec<DirEntry>> {
        self.provider.fetch_children(dir).await
    }

    pub async fn attributes(&self, path: &ObjectPath) -> FsResult<FileAttributes> {
        self.provider.read_attributes(path).await
    }

    /// Read a whole object / 读取整个对象
    pub async fn read(&self, path: &ObjectPath) -> FsResult<Vec<u8>> {
        let mut reader = self
            .provider
            .new_byte_channel(path, &[OpenOption::Read])
            .await?
            .into_reader()?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.map_err(FsError::from)?;
        Ok(data)
    }

    /// Replace an object with `data` / 写入整个对象
    pub async fn write(&self, path: &ObjectPath, data: &[u8]) -> FsResult<u64> {
        let mut writer = self
            .provider
            .new_byte_channel(path, &[OpenOption::Write, OpenOption::Create, OpenOption::TruncateExisting])
            .await?
            .into_writer()?;
        writer.write(data).await?;
        writer.close().await?;
        Ok(writer.bytes_written())
    }
}

impl Drop for ObjectFileSystem {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::memory::{MemoryConnector, MemoryStore};

    async fn connect(store: &Arc<MemoryStore>, default_path: &str) -> ObjectFileSystem {
        let options = FileSystemOptions {
            default_path: default_path.to_string(),
            ..Default::default()
        };
        ObjectFileSystem::connect(Arc::new(MemoryConnector::new(store.clone())), options)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_paths() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        let fs = connect(&store, "bucket-0/home").await;

        assert_eq!(fs.default_path().to_string(), "/bucket-0/home");
        assert_eq!(fs.get_path("a.txt").to_string(), "/bucket-0/home/a.txt");
        assert_eq!(fs.get_path("../x").to_string(), "/bucket-0/x");
        assert_eq!(fs.get_path("/bucket-1/y").to_string(), "/bucket-1/y");
        assert_eq!(fs.root_directories(), vec![ObjectPath::root()]);
        assert_eq!(fs.buckets().len(), 1);
    }

    #[tokio::test]
    async fn test_read_write() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        let fs = connect(&store, "/").await;

        let path = fs.get_path("/bucket-0/test-1/test-2/test-3/file-0");
        assert_eq!(fs.write(&path, b"hello").await.unwrap(), 5);
        assert_eq!(fs.read(&path).await.unwrap(), b"hello");

        let entries = fs.list(&fs.get_path("/bucket-0")).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].attributes.is_directory());
        assert!(fs.attributes(&path).await.unwrap().is_regular_file());
    }

    #[tokio::test]
    async fn test_close_cascades() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        store.create_bucket_in("bucket-1", "eu-west-1");
        let fs = connect(&store, "/").await;

        fs.list(&fs.get_path("/bucket-0")).await.unwrap();
        fs.list(&fs.get_path("/bucket-1")).await.unwrap();
        assert!(fs.is_open());

        fs.close();
        fs.close();
        assert!(!fs.is_open());
        assert_eq!(store.clients_shut_down(), 2);
        assert!(fs.list(&fs.get_path("/bucket-0")).await.unwrap_err().is_closed());

        drop(fs);
        assert_eq!(store.clients_shut_down(), 2);
    }

    #[tokio::test]
    async fn test_from_config() {
        let registry = ConnectorRegistry::new();
        crate::drivers::register_all(&registry);
        let config = HostConfig::new("memory", serde_json::json!({ "buckets": ["a", "b"] }));

        let fs = ObjectFileSystem::from_config(&config, &registry).await.unwrap();
        let names: Vec<String> = fs.list(&ObjectPath::root()).await.unwrap().iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let config = HostConfig::new("nope", serde_json::Value::Null);
        assert!(matches!(
            ObjectFileSystem::from_config(&config, &registry).await,
            Err(FsError::Config(_))
        ));
    }
}
