//! Per-session client registry / 会话级客户端管理
//!
//! One backend client per region (plus endpoint), created lazily and shut down
//! exactly once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{BucketInfo, ClientConnector, ObjectClient};
use crate::error::{FsError, FsResult};

pub struct ClientHandler {
    connector: Arc<dyn ClientConnector>,
    buckets: Vec<BucketInfo>,
    /// key: client key (region), value: client / 键：区域，值：客户端
    clients: Mutex<HashMap<String, Arc<dyn ObjectClient>>>,
    closed: AtomicBool,
}

impl ClientHandler {
    /// Create a handler over an already fetched bucket list / 使用已获取的存储桶列表创建
    pub fn new(connector: Arc<dyn ClientConnector>, buckets: Vec<BucketInfo>) -> Self {
        Self {
            connector,
            buckets,
            clients: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Fetch the bucket list once and create the handler / 获取存储桶列表并创建
    pub async fn connect(connector: Arc<dyn ClientConnector>) -> FsResult<Self> {
        let buckets = connector.list_buckets().await?;
        tracing::debug!("{}: fetched {} buckets", connector.name(), buckets.len());
        Ok(Self::new(connector, buckets))
    }

    /// Buckets known to this session (immutable) / 会话内的存储桶
    pub fn buckets(&self) -> &[BucketInfo] {
        &self.buckets
    }

    pub fn bucket(&self, name: &str) -> Option<&BucketInfo> {
        self.buckets.iter().find(|b| b.name == name)
    }

    pub fn backend_name(&self) -> &str {
        self.connector.name()
    }

    /// Client serving `bucket`, created on first use / 获取存储桶对应的客户端
    pub fn client_for_bucket(&self, bucket: &str) -> FsResult<Arc<dyn ObjectClient>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FsError::Closed("client handler"));
        }

        let info = self
            .bucket(bucket)
            .ok_or_else(|| FsError::UnknownBucket(bucket.to_string()))?;
        let key = info.client_key();

        let mut clients = self.clients.lock();
        // close() may have drained the map while we waited for the lock
        if self.closed.load(Ordering::Acquire) {
            return Err(FsError::Closed("client handler"));
        }
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let client = self.connector.connect(info)?;
        tracing::debug!("{}: created client for region {}", self.connector.name(), key);
        clients.insert(key, client.clone());
        Ok(client)
    }

    /// Number of live cached clients / 已缓存的客户端数量
    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Shut down every cached client; later calls are no-ops / 关闭所有客户端（幂等）
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let clients: Vec<_> = self.clients.lock().drain().collect();
        for (key, client) in &clients {
            client.shutdown();
            tracing::debug!("{}: client {} shut down", self.connector.name(), key);
        }
        tracing::info!("{}: client handler closed ({} clients)", self.connector.name(), clients.len());
    }
}

impl Drop for ClientHandler {
    fn drop(&mut self) {
        self.close();
    }
}
