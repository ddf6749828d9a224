use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::AsyncRead;

use crate::error::FsResult;

/// Streaming object body / 对象数据流
pub type ObjectStream = Box<dyn AsyncRead + Unpin + Send>;

/// Bucket description fetched once per session / 存储桶信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
    /// Storage region (location) of the bucket / 存储桶所在区域
    #[serde(default)]
    pub region: String,
    /// Per-bucket endpoint when the backend reports one (OSS extranet endpoint) / 存储桶端点
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl BucketInfo {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            creation_date: None,
            region: region.into(),
            endpoint: None,
        }
    }

    pub fn with_creation_date(mut self, date: DateTime<Utc>) -> Self {
        self.creation_date = Some(date);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Key of the cached client serving this bucket / 客户端缓存键
    pub fn client_key(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}@{}", self.region, endpoint),
            None => self.region.clone(),
        }
    }
}

/// Delimiter listing request (one page) / 分页列举请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListObjectsRequest {
    pub bucket: String,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    /// Opaque token returned by the previous page / 分页令牌
    pub continuation_token: Option<String>,
    /// Start listing after this key when no token is available / 起始键
    pub start_after: Option<String>,
    pub max_keys: usize,
}

/// Object summary from a listing or head call / 对象摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a listing / 列举结果页
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    pub common_prefixes: Vec<String>,
    pub objects: Vec<ObjectSummary>,
    pub is_truncated: bool,
    /// Present when `is_truncated` and the backend issued a token / 下一页令牌
    pub next_continuation_token: Option<String>,
}

/// One live backend client (scoped to a region/endpoint) / 后端客户端
///
/// Only primitive object operations; directory semantics are built on top by
/// the file system provider.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// List one page / 列举一页对象
    async fn list_objects(&self, request: &ListObjectsRequest) -> FsResult<ObjectListing>;

    /// Streaming GET / 流式读取对象
    async fn get_object(&self, bucket: &str, key: &str) -> FsResult<ObjectStream>;

    /// Streaming PUT, consumes `body` until EOF and replaces the whole object / 流式上传整个对象
    async fn put_object(&self, bucket: &str, key: &str, body: &mut ObjectStream) -> FsResult<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> FsResult<()>;

    /// HEAD; `Ok(None)` when the object does not exist / 检查对象是否存在
    async fn head_object(&self, bucket: &str, key: &str) -> FsResult<Option<ObjectSummary>>;

    /// Release client resources / 关闭客户端
    fn shutdown(&self) {}
}

/// Enumerates buckets and builds clients for them / 后端连接器
#[async_trait]
pub trait ClientConnector: Send + Sync {
    /// Backend name for logs / 后端名称
    fn name(&self) -> &str;

    async fn list_buckets(&self) -> FsResult<Vec<BucketInfo>>;

    /// Build a client able to serve `bucket` / 为存储桶创建客户端
    fn connect(&self, bucket: &BucketInfo) -> FsResult<Arc<dyn ObjectClient>>;
}

pub mod handler;
pub mod registry;

pub use handler::ClientHandler;
pub use registry::{ConnectorFactory, ConnectorRegistry};
