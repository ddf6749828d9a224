//! File system provider / 文件系统提供者
//!
//! Turns flat, paginated object listings into a directory tree. Directories
//! created locally have no backend object and live only in the synthetic
//! registry. Attributes are cached in a side table keyed by absolute path and
//! refreshed by every listing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use super::channel::{ByteChannel, OpenOption, ReadChannel, WriteChannel};
use super::path::{DirEntry, FileAttributes, ObjectPath, SEPARATOR};
use crate::error::{FsError, FsResult};
use crate::storage::{ClientHandler, ListObjectsRequest, ObjectClient};

/// Keys per listing page / 每页列举数量
pub const LIST_PAGE_SIZE: usize = 100;

/// Chunks queued ahead of an upload worker / 上传队列深度
pub const DEFAULT_UPLOAD_QUEUE_DEPTH: usize = 8;

#[derive(Default)]
struct ProviderState {
    /// parent path -> synthetic child directories / 父路径 -> 本地创建的子目录
    directories: HashMap<String, Vec<DirEntry>>,
    /// absolute path -> last known attributes / 属性缓存
    attributes: HashMap<String, FileAttributes>,
}

impl ProviderState {
    fn is_synthetic(&self, path: &ObjectPath) -> bool {
        path.parent()
            .and_then(|parent| self.directories.get(&parent.to_string()))
            .map(|children| children.iter().any(|e| &e.path == path))
            .unwrap_or(false)
    }

    fn is_directory(&self, path: &ObjectPath) -> bool {
        self.attributes
            .get(&path.to_string())
            .map(|a| a.directory)
            .unwrap_or(false)
            || self.is_synthetic(path)
    }

    fn cache(&mut self, entries: &[DirEntry]) {
        for entry in entries {
            self.attributes.insert(entry.path.to_string(), entry.attributes);
        }
    }

    /// Drop cached attributes below `dir` whose child was not listed / 清除已消失子项的缓存
    fn evict_missing(&mut self, dir: &ObjectPath, listed: &[DirEntry]) {
        let below = format!("{}{}", dir, SEPARATOR);
        let names: HashSet<&str> = listed.iter().map(|e| e.name()).collect();
        self.attributes.retain(|key, _| match key.strip_prefix(below.as_str()) {
            Some(rest) => rest
                .split(SEPARATOR)
                .next()
                .map(|child| names.contains(child))
                .unwrap_or(false),
            None => true,
        });
    }
}

/// Materialized directory listing / 目录流
#[derive(Debug)]
pub struct DirectoryStream {
    entries: std::vec::IntoIter<DirEntry>,
}

impl DirectoryStream {
    fn new(entries: Vec<DirEntry>) -> Self {
        Self { entries: entries.into_iter() }
    }
}

impl Iterator for DirectoryStream {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for DirectoryStream {}

pub struct FileSystemProvider {
    handler: Arc<ClientHandler>,
    state: Mutex<ProviderState>,
    upload_queue_depth: usize,
}

impl FileSystemProvider {
    pub fn new(handler: Arc<ClientHandler>) -> Self {
        Self {
            handler,
            state: Mutex::new(ProviderState::default()),
            upload_queue_depth: DEFAULT_UPLOAD_QUEUE_DEPTH,
        }
    }

    pub fn with_upload_queue_depth(mut self, depth: usize) -> Self {
        self.upload_queue_depth = depth.max(1);
        self
    }

    pub fn handler(&self) -> &Arc<ClientHandler> {
        &self.handler
    }

    fn ensure_open(&self) -> FsResult<()> {
        if self.handler.is_closed() {
            return Err(FsError::Closed("file system"));
        }
        Ok(())
    }

    /// Bucket and key of an object path; root and buckets are not objects
    fn object_target(path: &ObjectPath, op: &'static str) -> FsResult<(String, String)> {
        if path.is_root() || path.is_bucket() {
            return Err(FsError::Unsupported(op));
        }
        let bucket = path
            .bucket_name()
            .ok_or_else(|| FsError::InvalidPath(path.to_string()))?;
        Ok((bucket.to_string(), path.object_name()))
    }

    fn not_found(path: &ObjectPath) -> FsError {
        FsError::NotFound(path.to_string())
    }

    /// Cached attributes, if any / 缓存的属性
    pub fn cached_attributes(&self, path: &ObjectPath) -> Option<FileAttributes> {
        self.state.lock().attributes.get(&path.to_absolute().to_string()).copied()
    }

    /// List the children of `dir` / 列出子项
    ///
    /// Drains every backend page, then appends synthetic directories the
    /// backend did not return. Backend order is kept.
    pub async fn fetch_children(&self, dir: &ObjectPath) -> FsResult<Vec<DirEntry>> {
        self.ensure_open()?;
        let dir = dir.to_absolute();

        if dir.is_root() {
            let entries: Vec<DirEntry> = self
                .handler
                .buckets()
                .iter()
                .map(|b| {
                    DirEntry::new(
                        ObjectPath::from_names(true, [b.name.as_str()]),
                        FileAttributes::directory(b.creation_date),
                    )
                })
                .collect();
            self.state.lock().cache(&entries);
            return Ok(entries);
        }

        let bucket = dir
            .bucket_name()
            .ok_or_else(|| FsError::InvalidPath(dir.to_string()))?
            .to_string();
        let client = self.handler.client_for_bucket(&bucket)?;

        let object_name = dir.object_name();
        let prefix = if object_name.is_empty() {
            None
        } else {
            Some(format!("{}{}", object_name, SEPARATOR))
        };
        let strip = |key: &str| -> String {
            let name = match &prefix {
                Some(p) => key.strip_prefix(p.as_str()).unwrap_or(key),
                None => key,
            };
            name.trim_end_matches(SEPARATOR).to_string()
        };

        let mut entries = Vec::new();
        let mut token: Option<String> = None;
        let mut start_after: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let request = ListObjectsRequest {
                bucket: bucket.clone(),
                prefix: prefix.clone(),
                delimiter: Some(SEPARATOR.to_string()),
                continuation_token: token.clone(),
                start_after: start_after.clone(),
                max_keys: LIST_PAGE_SIZE,
            };
            let listing = client.list_objects(&request).await?;
            pages += 1;

            let mut last: Option<String> = None;
            for common in &listing.common_prefixes {
                let name = strip(common);
                if !name.is_empty() {
                    entries.push(DirEntry::new(dir.resolve(&name), FileAttributes::directory(None)));
                }
                last = last.max(Some(common.clone()));
            }
            for object in &listing.objects {
                last = last.max(Some(object.key.clone()));
                // folder marker objects
                if object.key.ends_with(SEPARATOR) {
                    continue;
                }
                let name = strip(&object.key);
                if name.is_empty() {
                    continue;
                }
                entries.push(DirEntry::new(
                    dir.resolve(&name),
                    FileAttributes::file(object.size, object.last_modified),
                ));
            }

            if !listing.is_truncated {
                break;
            }
            match listing.next_continuation_token {
                Some(next) if token.as_ref() != Some(&next) => token = Some(next),
                _ => {
                    // no token: resume after the largest key or prefix seen
                    if last.is_none() || last <= start_after {
                        tracing::warn!("listing {} truncated without a usable continuation, stopping", dir);
                        break;
                    }
                    token = None;
                    start_after = last;
                }
            }
        }

        {
            let mut state = self.state.lock();
            if let Some(children) = state.directories.get(&dir.to_string()) {
                let seen: HashSet<String> = entries.iter().map(|e| e.name().to_string()).collect();
                let extra: Vec<DirEntry> = children
                    .iter()
                    .filter(|c| !seen.contains(c.name()))
                    .cloned()
                    .collect();
                entries.extend(extra);
            }
            state.evict_missing(&dir, &entries);
            state.cache(&entries);
        }

        tracing::debug!("listed {}: {} entries, {} pages", dir, entries.len(), pages);
        Ok(entries)
    }

    pub async fn new_directory_stream(&self, dir: &ObjectPath) -> FsResult<DirectoryStream> {
        Ok(DirectoryStream::new(self.fetch_children(dir).await?))
    }

    /// Open a read or write channel / 打开字节通道
    ///
    /// `Write` starts an upload that replaces the whole object; without it the
    /// object is streamed from the backend.
    pub async fn new_byte_channel(&self, path: &ObjectPath, options: &[OpenOption]) -> FsResult<ByteChannel> {
        self.ensure_open()?;
        let path = path.to_absolute();
        if options.contains(&OpenOption::Append) {
            return Err(FsError::Unsupported("append"));
        }
        let (bucket, key) = Self::object_target(&path, "byte channel on root or bucket")?;
        let client = self.handler.client_for_bucket(&bucket)?;

        if options.contains(&OpenOption::Write) {
            self.state.lock().attributes.remove(&path.to_string());
            let channel = WriteChannel::spawn(path, client, bucket, key, self.upload_queue_depth);
            return Ok(ByteChannel::Write(channel));
        }

        let size = self.cached_attributes(&path).map(|a| a.size).unwrap_or(0);
        let body = client.get_object(&bucket, &key).await?;
        Ok(ByteChannel::Read(ReadChannel::new(path, body, size)))
    }

    /// Register a synthetic directory, nothing is written to the backend / 创建目录（仅内存）
    pub fn create_directory(&self, dir: &ObjectPath) -> FsResult<()> {
        self.ensure_open()?;
        let dir = dir.to_absolute();
        if dir.is_root() || dir.is_bucket() {
            return Err(FsError::Unsupported("create directory on root or bucket"));
        }
        let bucket = dir.bucket_name().unwrap_or_default();
        if self.handler.bucket(bucket).is_none() {
            return Err(FsError::UnknownBucket(bucket.to_string()));
        }
        let parent = dir
            .parent()
            .ok_or_else(|| FsError::InvalidPath(dir.to_string()))?;

        let attributes = FileAttributes::directory(Some(Utc::now()));
        let mut state = self.state.lock();
        let children = state.directories.entry(parent.to_string()).or_default();
        if !children.iter().any(|e| e.path == dir) {
            children.push(DirEntry::new(dir.clone(), attributes));
        }
        state.attributes.insert(dir.to_string(), attributes);
        tracing::debug!("created directory {}", dir);
        Ok(())
    }

    /// Delete an object, or forget a directory / 删除
    pub async fn delete(&self, path: &ObjectPath) -> FsResult<()> {
        self.ensure_open()?;
        let path = path.to_absolute();
        let (bucket, key) = Self::object_target(&path, "delete root or bucket")?;
        let path_key = path.to_string();

        {
            let mut state = self.state.lock();
            if state.is_directory(&path) {
                if let Some(parent) = path.parent().map(|p| p.to_string()) {
                    if let Some(children) = state.directories.get_mut(&parent) {
                        children.retain(|e| e.path != path);
                        if children.is_empty() {
                            state.directories.remove(&parent);
                        }
                    }
                }
                let below = format!("{}{}", path_key, SEPARATOR);
                state.directories.retain(|k, _| k != &path_key && !k.starts_with(&below));
                state.attributes.retain(|k, _| k != &path_key && !k.starts_with(&below));
                tracing::debug!("removed directory {}", path);
                return Ok(());
            }
        }

        let client = self.handler.client_for_bucket(&bucket)?;
        client.delete_object(&bucket, &key).await?;
        self.state.lock().attributes.remove(&path_key);
        tracing::debug!("deleted {}", path);
        Ok(())
    }

    /// Existence check / 检查是否存在
    ///
    /// Uses the same object-then-prefix probe as `read_attributes`. Backend
    /// faults are reported as `NotFound`.
    pub async fn check_access(&self, path: &ObjectPath) -> FsResult<()> {
        self.ensure_open()?;
        let path = path.to_absolute();
        if path.is_root() {
            return Ok(());
        }
        let bucket = path.bucket_name().unwrap_or_default().to_string();
        if self.handler.bucket(&bucket).is_none() {
            return Err(Self::not_found(&path));
        }
        if path.is_bucket() || self.state.lock().is_directory(&path) {
            return Ok(());
        }

        let client = match self.handler.client_for_bucket(&bucket) {
            Ok(client) => client,
            Err(e) if e.is_closed() => return Err(e),
            Err(_) => return Err(Self::not_found(&path)),
        };
        match self.probe(client.as_ref(), &bucket, &path.object_name()).await {
            Ok(Some(attributes)) => {
                self.state.lock().attributes.insert(path.to_string(), attributes);
                Ok(())
            }
            Ok(None) => Err(Self::not_found(&path)),
            Err(e) => {
                tracing::warn!("check_access {}: {}", path, e);
                Err(Self::not_found(&path))
            }
        }
    }

    /// Basic attributes, from cache or the backend / 读取属性
    pub async fn read_attributes(&self, path: &ObjectPath) -> FsResult<FileAttributes> {
        self.ensure_open()?;
        let path = path.to_absolute();
        if path.is_root() {
            return Ok(FileAttributes::directory(None));
        }
        let bucket = path.bucket_name().unwrap_or_default().to_string();
        let info = self
            .handler
            .bucket(&bucket)
            .ok_or_else(|| Self::not_found(&path))?;
        if path.is_bucket() {
            return Ok(FileAttributes::directory(info.creation_date));
        }

        {
            let state = self.state.lock();
            if let Some(attributes) = state.attributes.get(&path.to_string()) {
                return Ok(*attributes);
            }
            if state.is_synthetic(&path) {
                return Ok(FileAttributes::directory(None));
            }
        }

        let client = self.handler.client_for_bucket(&bucket)?;
        let attributes = self
            .probe(client.as_ref(), &bucket, &path.object_name())
            .await?
            .ok_or_else(|| Self::not_found(&path))?;
        self.state.lock().attributes.insert(path.to_string(), attributes);
        Ok(attributes)
    }

    /// Object first, then any key under `key/` / 先查对象，再查前缀
    async fn probe(&self, client: &dyn ObjectClient, bucket: &str, key: &str) -> FsResult<Option<FileAttributes>> {
        if let Some(summary) = client.head_object(bucket, key).await? {
            return Ok(Some(FileAttributes::file(summary.size, summary.last_modified)));
        }
        let request = ListObjectsRequest {
            bucket: bucket.to_string(),
            prefix: Some(format!("{}{}", key, SEPARATOR)),
            delimiter: Some(SEPARATOR.to_string()),
            continuation_token: None,
            start_after: None,
            max_keys: 1,
        };
        let listing = client.list_objects(&request).await?;
        if listing.common_prefixes.is_empty() && listing.objects.is_empty() {
            return Ok(None);
        }
        Ok(Some(FileAttributes::directory(None)))
    }

    /// Parent of `path`, recorded as a directory / 获取父路径并标记为目录
    pub fn parent(&self, path: &ObjectPath) -> Option<ObjectPath> {
        let parent = path.to_absolute().parent()?;
        let mut state = self.state.lock();
        let entry = state
            .attributes
            .entry(parent.to_string())
            .or_insert_with(|| FileAttributes::directory(None));
        if !entry.directory {
            *entry = FileAttributes::directory(entry.last_modified);
        }
        Some(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::memory::{MemoryConnector, MemoryStore};
    use tokio::io::AsyncReadExt;

    async fn provider(store: &Arc<MemoryStore>) -> FileSystemProvider {
        let handler = ClientHandler::connect(Arc::new(MemoryConnector::new(store.clone())))
            .await
            .unwrap();
        FileSystemProvider::new(Arc::new(handler))
    }

    fn p(path: &str) -> ObjectPath {
        ObjectPath::parse(path)
    }

    async fn read_all(provider: &FileSystemProvider, path: &str) -> Vec<u8> {
        let mut reader = provider
            .new_byte_channel(&p(path), &[OpenOption::Read])
            .await
            .unwrap()
            .into_reader()
            .unwrap();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.unwrap();
        data
    }

    #[tokio::test]
    async fn test_flat_listing_pages() {
        for n in [0usize, 1, 99, 100, 101, 250] {
            let store = Arc::new(MemoryStore::new());
            store.create_bucket("bucket-0");
            for i in 0..n {
                store
                    .insert_object("bucket-0", &format!("file-{:04}", i), vec![b'x'; i % 7 + 1])
                    .unwrap();
            }
            let provider = provider(&store).await;

            let entries = provider.fetch_children(&p("/bucket-0")).await.unwrap();
            assert_eq!(entries.len(), n);
            for (i, entry) in entries.iter().enumerate() {
                assert!(entry.attributes.is_regular_file());
                assert_eq!(entry.name(), format!("file-{:04}", i));
                assert_eq!(entry.attributes.size, (i % 7 + 1) as u64);
                assert!(entry.attributes.last_modified.is_some());
            }
            assert_eq!(store.list_calls(), ((n + LIST_PAGE_SIZE - 1) / LIST_PAGE_SIZE).max(1), "n = {}", n);
        }
    }

    #[tokio::test]
    async fn test_listing_without_continuation_tokens() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        store.withhold_continuation_tokens();
        for i in 0..250 {
            store.insert_object("bucket-0", &format!("file-{:04}", i), "x").unwrap();
        }
        for i in 0..3 {
            store.insert_object("bucket-0", &format!("zdir-{}/f", i), "x").unwrap();
        }
        let provider = provider(&store).await;

        let entries = provider.fetch_children(&p("/bucket-0")).await.unwrap();
        assert_eq!(entries.len(), 253);
        assert_eq!(entries[250].name(), "zdir-0");
        assert!(entries[252].attributes.is_directory());
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_relisting_evicts_vanished_children() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        store.insert_object("bucket-0", "a", "hello").unwrap();
        store.insert_object("bucket-0", "d/x", "1").unwrap();
        store.insert_object("bucket-0", "keep", "1").unwrap();
        let provider = provider(&store).await;
        provider.create_directory(&p("/bucket-0/local")).unwrap();

        assert_eq!(provider.fetch_children(&p("/bucket-0")).await.unwrap().len(), 4);
        provider.fetch_children(&p("/bucket-0/d")).await.unwrap();
        assert!(provider.cached_attributes(&p("/bucket-0/d/x")).is_some());

        let client = provider.handler().client_for_bucket("bucket-0").unwrap();
        client.delete_object("bucket-0", "a").await.unwrap();
        client.delete_object("bucket-0", "d/x").await.unwrap();

        let names: Vec<String> = provider
            .fetch_children(&p("/bucket-0"))
            .await
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["keep", "local"]);

        assert!(provider.cached_attributes(&p("/bucket-0/a")).is_none());
        assert!(provider.cached_attributes(&p("/bucket-0/d")).is_none());
        assert!(provider.cached_attributes(&p("/bucket-0/d/x")).is_none());
        assert!(provider.cached_attributes(&p("/bucket-0/local")).unwrap().is_directory());
        assert!(provider.read_attributes(&p("/bucket-0/a")).await.unwrap_err().is_not_found());
        assert!(provider.read_attributes(&p("/bucket-0/keep")).await.unwrap().is_regular_file());
    }

    #[tokio::test]
    async fn test_root_lists_every_bucket() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        store.create_bucket("bucket-1");
        store.create_bucket_in("empty", "eu-west-1");
        store.insert_object("bucket-0", "a", "1").unwrap();
        let provider = provider(&store).await;

        let entries: Vec<DirEntry> = provider.new_directory_stream(&ObjectPath::root()).await.unwrap().collect();
        let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["bucket-0", "bucket-1", "empty"]);
        assert!(entries.iter().all(|e| e.attributes.is_directory()));
        assert!(entries.iter().all(|e| e.attributes.last_modified.is_some()));
        assert_eq!(store.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_nested_scenario() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        store.insert_object("bucket-0", "test-1/test-2/test-3/file-0", "hello").unwrap();
        let provider = provider(&store).await;

        let mut dir = p("/bucket-0");
        for name in ["test-1", "test-2", "test-3"] {
            let entries = provider.fetch_children(&dir).await.unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].name(), name);
            assert!(entries[0].attributes.is_directory());
            dir = entries[0].path.clone();
        }
        let entries = provider.fetch_children(&dir).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, p("/bucket-0/test-1/test-2/test-3/file-0"));
        assert_eq!(entries[0].attributes.size, 5);

        assert_eq!(read_all(&provider, "/bucket-0/test-1/test-2/test-3/file-0").await, b"hello");
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        let provider = provider(&store).await;

        let data: Vec<u8> = (0..20_000u32).map(|i| (i * 7 % 256) as u8).collect();
        let mut channel = provider
            .new_byte_channel(&p("/bucket-0/dir/data.bin"), &[OpenOption::Write, OpenOption::Create])
            .await
            .unwrap();
        for chunk in data.chunks(3000) {
            channel.write(chunk).await.unwrap();
        }
        channel.close().await.unwrap();
        assert_eq!(channel.size(), data.len() as u64);

        assert_eq!(read_all(&provider, "/bucket-0/dir/data.bin").await, data);

        let entries = provider.fetch_children(&p("/bucket-0/dir")).await.unwrap();
        assert_eq!(entries[0].attributes.size, data.len() as u64);
        let attributes = provider.read_attributes(&p("/bucket-0/dir/data.bin")).await.unwrap();
        assert_eq!(attributes.size, data.len() as u64);
    }

    #[tokio::test]
    async fn test_upload_failure_on_close() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        store.fail_uploads("disk full");
        let provider = provider(&store).await;

        let mut channel = provider
            .new_byte_channel(&p("/bucket-0/f"), &[OpenOption::Write])
            .await
            .unwrap();
        let _ = channel.write(b"some bytes").await;
        let err = channel.close().await.unwrap_err();
        assert!(matches!(err, FsError::Backend(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn test_create_directory() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        store.insert_object("bucket-0", "a/x", "1").unwrap();
        let provider = provider(&store).await;

        provider.create_directory(&p("/bucket-0/new")).unwrap();
        provider.create_directory(&p("/bucket-0/new")).unwrap();
        // same name as a backend prefix
        provider.create_directory(&p("/bucket-0/a")).unwrap();

        let entries = provider.fetch_children(&p("/bucket-0")).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a", "new"]);
        assert!(entries.iter().all(|e| e.attributes.is_directory()));
        assert_eq!(store.object_count("bucket-0"), 1);

        // listing does not forget synthetic directories
        let entries = provider.fetch_children(&p("/bucket-0")).await.unwrap();
        assert_eq!(entries.len(), 2);

        assert!(matches!(provider.create_directory(&ObjectPath::root()), Err(FsError::Unsupported(_))));
        assert!(matches!(provider.create_directory(&p("/bucket-0")), Err(FsError::Unsupported(_))));
        assert!(matches!(provider.create_directory(&p("/nope/x")), Err(FsError::UnknownBucket(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        store.insert_object("bucket-0", "keep", "1").unwrap();
        store.insert_object("bucket-0", "gone", "2").unwrap();
        let provider = provider(&store).await;

        provider.create_directory(&p("/bucket-0/tmp")).unwrap();
        provider.create_directory(&p("/bucket-0/tmp/inner")).unwrap();
        provider.delete(&p("/bucket-0/tmp")).await.unwrap();
        assert_eq!(store.object_count("bucket-0"), 2);
        assert!(provider.check_access(&p("/bucket-0/tmp/inner")).await.is_err());

        provider.delete(&p("/bucket-0/gone")).await.unwrap();
        assert!(store.object("bucket-0", "gone").is_none());

        let names: Vec<String> = provider
            .fetch_children(&p("/bucket-0"))
            .await
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["keep"]);

        assert!(matches!(provider.delete(&p("/bucket-0")).await, Err(FsError::Unsupported(_))));
        assert!(matches!(provider.delete(&ObjectPath::root()).await, Err(FsError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_check_access() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        store.insert_object("bucket-0", "file", "1").unwrap();
        let provider = provider(&store).await;
        provider.create_directory(&p("/bucket-0/local")).unwrap();

        provider.check_access(&ObjectPath::root()).await.unwrap();
        provider.check_access(&p("/bucket-0")).await.unwrap();
        provider.check_access(&p("/bucket-0/local")).await.unwrap();
        provider.check_access(&p("/bucket-0/file")).await.unwrap();
        assert!(provider.check_access(&p("/bucket-0/missing")).await.unwrap_err().is_not_found());
        assert!(provider.check_access(&p("/other/file")).await.unwrap_err().is_not_found());

        provider.handler().close();
        assert!(provider.check_access(&p("/bucket-0/file")).await.unwrap_err().is_closed());
        assert!(provider.fetch_children(&p("/bucket-0")).await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_check_access_agrees_with_attributes_on_prefixes() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        store.insert_object("bucket-0", "dir/file", "1").unwrap();
        let provider = provider(&store).await;

        // never listed, only known as a key prefix
        provider.check_access(&p("/bucket-0/dir")).await.unwrap();
        assert!(provider.cached_attributes(&p("/bucket-0/dir")).unwrap().is_directory());
        assert!(provider.read_attributes(&p("/bucket-0/dir")).await.unwrap().is_directory());
        assert!(provider.check_access(&p("/bucket-0/di")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_read_attributes() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        store.insert_object("bucket-0", "a/b/c", "abc").unwrap();
        let provider = provider(&store).await;

        assert!(provider.read_attributes(&p("/bucket-0/a")).await.unwrap().is_directory());
        assert!(provider.read_attributes(&p("/bucket-0/a/b")).await.unwrap().is_directory());
        let file = provider.read_attributes(&p("/bucket-0/a/b/c")).await.unwrap();
        assert!(file.is_regular_file());
        assert_eq!(file.size, 3);
        assert!(provider.read_attributes(&p("/bucket-0/zzz")).await.unwrap_err().is_not_found());
        assert!(provider.read_attributes(&p("/bucket-0")).await.unwrap().is_directory());
    }

    #[tokio::test]
    async fn test_parent_marks_directory() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        let provider = provider(&store).await;

        let parent = provider.parent(&p("/bucket-0/x/y")).unwrap();
        assert_eq!(parent, p("/bucket-0/x"));
        assert!(provider.cached_attributes(&parent).unwrap().is_directory());
        assert!(provider.parent(&ObjectPath::root()).is_none());
    }

    #[tokio::test]
    async fn test_channel_options() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("bucket-0");
        let provider = provider(&store).await;

        let err = provider
            .new_byte_channel(&p("/bucket-0/f"), &[OpenOption::Write, OpenOption::Append])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FsError::Unsupported(_)));

        let err = provider
            .new_byte_channel(&p("/bucket-0"), &[OpenOption::Read])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FsError::Unsupported(_)));

        let err = provider
            .new_byte_channel(&p("/bucket-0/missing"), &[OpenOption::Read])
            .await
            .err()
            .unwrap();
        assert!(err.is_not_found());
    }
}
