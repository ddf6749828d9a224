//! 内存对象存储
//!
//! Behaves like a small S3: flat keys, delimiter listing with continuation tokens and
//! truncation, whole-object puts. Counts list calls and client lifecycle so
//! tests can assert on backend traffic.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;

use crate::error::{FsError, FsResult};
use crate::storage::{
    BucketInfo, ClientConnector, ListObjectsRequest, ObjectClient, ObjectListing, ObjectStream,
    ObjectSummary,
};

const DEFAULT_REGION: &str = "us-east-1";

struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

struct MemoryBucket {
    info: BucketInfo,
    objects: BTreeMap<String, StoredObject>,
}

/// 共享的内存存储
#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<BTreeMap<String, MemoryBucket>>,
    list_calls: AtomicUsize,
    clients_created: AtomicUsize,
    clients_shut_down: AtomicUsize,
    /// 设置后，上传在读取第一块数据后失败
    upload_failure: Mutex<Option<String>>,
    /// 截断的列举结果不返回续传令牌
    withhold_tokens: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_bucket(&self, name: &str) {
        self.create_bucket_in(name, DEFAULT_REGION);
    }

    pub fn create_bucket_in(&self, name: &str, region: &str) {
        let info = BucketInfo::new(name, region).with_creation_date(Utc::now());
        self.buckets.lock().entry(name.to_string()).or_insert(MemoryBucket {
            info,
            objects: BTreeMap::new(),
        });
    }

    /// 直接写入对象（用于准备测试数据）
    pub fn insert_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>) -> FsResult<()> {
        let mut buckets = self.buckets.lock();
        let bucket = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        bucket.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.buckets
            .lock()
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.data.clone())
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets.lock().get(bucket).map(|b| b.objects.len()).unwrap_or(0)
    }

    pub fn bucket_infos(&self) -> Vec<BucketInfo> {
        self.buckets.lock().values().map(|b| b.info.clone()).collect()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn clients_created(&self) -> usize {
        self.clients_created.load(Ordering::SeqCst)
    }

    pub fn clients_shut_down(&self) -> usize {
        self.clients_shut_down.load(Ordering::SeqCst)
    }

    /// 让之后的上传失败
    pub fn fail_uploads(&self, message: &str) {
        *self.upload_failure.lock() = Some(message.to_string());
    }

    /// 模拟不返回 NextContinuationToken 的服务端
    pub fn withhold_continuation_tokens(&self) {
        self.withhold_tokens.store(true, Ordering::SeqCst);
    }

    fn list(&self, request: &ListObjectsRequest) -> FsResult<ObjectListing> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let buckets = self.buckets.lock();
        let bucket = buckets
            .get(&request.bucket)
            .ok_or_else(|| no_such_bucket(&request.bucket))?;

        let prefix = request.prefix.as_deref().unwrap_or("");
        let delimiter = request.delimiter.as_deref().filter(|d| !d.is_empty());
        let max_keys = request.max_keys.max(1);

        // the token is the last key of the previous page
        let after = std::cmp::max(request.continuation_token.clone(), request.start_after.clone());
        let start = match &after {
            Some(key) => Bound::Excluded(key.clone()),
            None => Bound::Included(prefix.to_string()),
        };

        let mut listing = ObjectListing::default();
        let mut count = 0;
        let mut last: Option<String> = None;

        for (key, object) in bucket.objects.range::<String, _>((start, Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                if key.as_str() < prefix {
                    continue;
                }
                break;
            }
            // a common prefix used as start covers every key below it
            if let (Some(after), Some(d)) = (&after, delimiter) {
                if after.ends_with(d) && key.starts_with(after.as_str()) {
                    continue;
                }
            }

            let rest = &key[prefix.len()..];
            if let Some(idx) = delimiter.and_then(|d| rest.find(d).map(|i| i + d.len())) {
                let common = format!("{}{}", prefix, &rest[..idx]);
                if listing.common_prefixes.last() == Some(&common) {
                    continue;
                }
                if count == max_keys {
                    listing.is_truncated = true;
                    break;
                }
                listing.common_prefixes.push(common.clone());
                last = Some(common);
                count += 1;
                continue;
            }

            if count == max_keys {
                listing.is_truncated = true;
                break;
            }
            listing.objects.push(ObjectSummary {
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified: Some(object.last_modified),
            });
            last = Some(key.clone());
            count += 1;
        }

        if listing.is_truncated && !self.withhold_tokens.load(Ordering::SeqCst) {
            listing.next_continuation_token = last;
        }
        Ok(listing)
    }
}

fn no_such_bucket(bucket: &str) -> FsError {
    FsError::backend_msg(format!("NoSuchBucket: {}", bucket))
}

/// 内存客户端
pub struct MemoryClient {
    store: Arc<MemoryStore>,
    region: String,
}

impl MemoryClient {
    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl ObjectClient for MemoryClient {
    async fn list_objects(&self, request: &ListObjectsRequest) -> FsResult<ObjectListing> {
        self.store.list(request)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> FsResult<ObjectStream> {
        let data = {
            let buckets = self.store.buckets.lock();
            let b = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
            b.objects
                .get(key)
                .map(|o| o.data.clone())
                .ok_or_else(|| FsError::NotFound(format!("{}/{}", bucket, key)))?
        };
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: &mut ObjectStream) -> FsResult<()> {
        let exists = self.store.buckets.lock().contains_key(bucket);
        if !exists {
            return Err(no_such_bucket(bucket));
        }

        let failure = self.store.upload_failure.lock().clone();
        if let Some(message) = failure {
            let mut first = [0u8; 8192];
            let _ = body.read(&mut first).await?;
            return Err(FsError::backend_msg(message));
        }

        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        tracing::debug!("memory: put {}/{} ({} bytes)", bucket, key, data.len());
        self.store.insert_object(bucket, key, data)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> FsResult<()> {
        let mut buckets = self.store.buckets.lock();
        let b = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        b.objects.remove(key);
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> FsResult<Option<ObjectSummary>> {
        let buckets = self.store.buckets.lock();
        let b = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        Ok(b.objects.get(key).map(|o| ObjectSummary {
            key: key.to_string(),
            size: o.data.len() as u64,
            last_modified: Some(o.last_modified),
        }))
    }

    fn shutdown(&self) {
        self.store.clients_shut_down.fetch_add(1, Ordering::SeqCst);
    }
}

/// 内存连接器
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

#[async_trait]
impl ClientConnector for MemoryConnector {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_buckets(&self) -> FsResult<Vec<BucketInfo>> {
        Ok(self.store.bucket_infos())
    }

    fn connect(&self, bucket: &BucketInfo) -> FsResult<Arc<dyn ObjectClient>> {
        self.store.clients_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryClient {
            store: self.store.clone(),
            region: bucket.region.clone(),
        }))
    }
}
