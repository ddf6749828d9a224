//! S3驱动核心实现
//!
//! 设计原则：
//! - 只提供原语（list_objects, get_object, put_object等）
//! - 每个区域一个客户端，由 ClientHandler 缓存
//! - 读取和上传都是流式的，不在内存中缓存整个对象

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::TryStreamExt;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::serde_types::{HeadObjectResult, ListBucketResult};
use s3::Region;
use tokio_util::io::StreamReader;

use super::config::S3Config;
use crate::error::{FsError, FsResult};
use crate::storage::{
    BucketInfo, ClientConnector, ListObjectsRequest, ObjectClient, ObjectListing, ObjectStream,
    ObjectSummary,
};
use crate::utils::parse_timestamp;

fn is_success(code: u16) -> bool {
    (200..300).contains(&code)
}

/// 状态码转换为结果，404 视为不存在
fn check_status(op: &str, target: &str, code: u16) -> FsResult<()> {
    match code {
        code if is_success(code) => Ok(()),
        404 => Err(FsError::NotFound(target.to_string())),
        code => Err(FsError::backend_msg(format!("S3 {} {} returned {}", op, target, code))),
    }
}

/// 请求错误转换，带 404 响应体的错误视为不存在
fn request_error(target: &str, err: S3Error) -> FsError {
    match err {
        S3Error::HttpFailWithBody(404, _) => FsError::NotFound(target.to_string()),
        err => FsError::backend(err),
    }
}

/// GetBucketLocation 的结果转换为区域名，失败时退回配置的区域
fn located_region(config: &S3Config, name: &str, response: Result<(Region, u16), S3Error>) -> String {
    match response {
        Ok((region, code)) if is_success(code) => config.region_from_location(&region.to_string()),
        Ok((_, code)) => {
            tracing::warn!("S3 GetBucketLocation {} returned {}, using {}", name, code, config.region);
            config.region.clone()
        }
        Err(e) => {
            tracing::warn!("S3 GetBucketLocation {} failed: {}, using {}", name, e, config.region);
            config.region.clone()
        }
    }
}

/// ListObjectsV2 结果转换
fn listing_from(result: ListBucketResult) -> ObjectListing {
    let common_prefixes = result
        .common_prefixes
        .unwrap_or_default()
        .into_iter()
        .map(|cp| cp.prefix)
        .collect();

    let objects = result
        .contents
        .into_iter()
        .map(|obj| ObjectSummary {
            last_modified: parse_timestamp(&obj.last_modified),
            size: obj.size,
            key: obj.key,
        })
        .collect();

    ObjectListing {
        common_prefixes,
        objects,
        is_truncated: result.is_truncated,
        next_continuation_token: result.next_continuation_token.filter(|t| !t.is_empty()),
    }
}

/// HeadObject 结果转换，不存在时返回 None
fn summary_from_head(
    target: &str,
    key: &str,
    response: Result<(HeadObjectResult, u16), S3Error>,
) -> FsResult<Option<ObjectSummary>> {
    let (head, code) = match response.map_err(|e| request_error(target, e)) {
        Ok(response) => response,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e),
    };
    match check_status("HeadObject", target, code) {
        Ok(()) => Ok(Some(ObjectSummary {
            key: key.to_string(),
            size: head.content_length.unwrap_or(0).max(0) as u64,
            last_modified: head.last_modified.as_deref().and_then(parse_timestamp),
        })),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// DeleteObject 状态检查，对象不存在也算成功
fn check_deleted(target: &str, code: u16) -> FsResult<()> {
    match check_status("DeleteObject", target, code) {
        Err(e) if !e.is_not_found() => Err(e),
        _ => Ok(()),
    }
}

/// S3连接器：列出存储桶，并为每个区域创建客户端
pub struct S3Connector {
    config: S3Config,
    credentials: Credentials,
}

impl S3Connector {
    pub fn new(config: S3Config) -> FsResult<Self> {
        config.validate()?;
        let credentials = Credentials::new(
            Some(&config.access_key_id),
            Some(&config.secret_access_key),
            if config.session_token.is_empty() { None } else { Some(&config.session_token) },
            None,
            None,
        )
        .map_err(FsError::backend)?;
        Ok(Self { config, credentials })
    }

    fn region(&self, region: &str, endpoint: Option<&str>) -> FsResult<Region> {
        let region = if region.is_empty() { self.config.region.clone() } else { region.to_string() };
        let endpoint = match endpoint {
            Some(endpoint) => crate::utils::with_scheme(endpoint),
            None => self.config.endpoint_for(&region)?,
        };
        Ok(Region::Custom { region, endpoint })
    }

    fn client(&self, region: Region) -> S3RegionClient {
        S3RegionClient {
            region,
            credentials: self.credentials.clone(),
            path_style: self.config.force_path_style,
            timeout: self.config.request_timeout_secs.map(Duration::from_secs),
        }
    }

    /// 查询存储桶所在区域，失败时退回配置的区域
    async fn locate(&self, name: &str) -> String {
        let client = match self.region(&self.config.region, None) {
            Ok(region) => self.client(region),
            Err(_) => return self.config.region.clone(),
        };
        match client.bucket(name) {
            Ok(bucket) => located_region(&self.config, name, bucket.location().await),
            Err(_) => self.config.region.clone(),
        }
    }
}

#[async_trait]
impl ClientConnector for S3Connector {
    fn name(&self) -> &str {
        "s3"
    }

    async fn list_buckets(&self) -> FsResult<Vec<BucketInfo>> {
        if !self.config.buckets.is_empty() {
            return Ok(self
                .config
                .buckets
                .iter()
                .map(|name| BucketInfo::new(name.clone(), self.config.region.clone()))
                .collect());
        }

        let region = self.region(&self.config.region, None)?;
        let response = Bucket::list_buckets(region, self.credentials.clone())
            .await
            .map_err(FsError::backend)?;

        // 并发查询各存储桶区域
        let infos = response.buckets.bucket;
        let mut regions = vec![String::new(); infos.len()];
        let mut pending: FuturesUnordered<_> = infos
            .iter()
            .enumerate()
            .map(|(index, info)| async move { (index, self.locate(&info.name).await) })
            .collect();
        while let Some((index, region)) = pending.next().await {
            regions[index] = region;
        }
        drop(pending);

        let mut buckets = Vec::new();
        for (info, region) in infos.into_iter().zip(regions) {
            let mut bucket = BucketInfo::new(info.name.clone(), region);
            if let Some(date) = parse_timestamp(&info.creation_date.to_string()) {
                bucket = bucket.with_creation_date(date);
            }
            buckets.push(bucket);
        }
        tracing::debug!("S3 ListBuckets: {} buckets", buckets.len());
        Ok(buckets)
    }

    fn connect(&self, bucket: &BucketInfo) -> FsResult<Arc<dyn ObjectClient>> {
        let region = self.region(&bucket.region, bucket.endpoint.as_deref())?;
        tracing::debug!("S3 client for region {:?}", region);
        Ok(Arc::new(self.client(region)))
    }
}

/// 区域客户端：同一区域内的所有存储桶共用
pub struct S3RegionClient {
    region: Region,
    credentials: Credentials,
    path_style: bool,
    timeout: Option<Duration>,
}

impl S3RegionClient {
    /// 创建S3 Bucket句柄
    fn bucket(&self, name: &str) -> FsResult<Box<Bucket>> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(FsError::backend)?;

        let bucket = if self.path_style {
            bucket.with_path_style()
        } else {
            bucket
        };

        match self.timeout {
            Some(timeout) => bucket.with_request_timeout(timeout).map_err(FsError::backend),
            None => Ok(bucket),
        }
    }
}

#[async_trait]
impl ObjectClient for S3RegionClient {
    async fn list_objects(&self, request: &ListObjectsRequest) -> FsResult<ObjectListing> {
        let bucket = self.bucket(&request.bucket)?;

        let (result, code) = bucket
            .list_page(
                request.prefix.clone().unwrap_or_default(),
                request.delimiter.clone(),
                request.continuation_token.clone(),
                request.start_after.clone(),
                Some(request.max_keys),
            )
            .await
            .map_err(FsError::backend)?;

        if !is_success(code) {
            return Err(FsError::backend_msg(format!(
                "S3 ListObjects {} returned {}",
                request.bucket, code
            )));
        }
        Ok(listing_from(result))
    }

    async fn get_object(&self, bucket_name: &str, key: &str) -> FsResult<ObjectStream> {
        let bucket = self.bucket(bucket_name)?;

        let target = format!("{}/{}", bucket_name, key);

        // 流式获取对象
        let response = bucket
            .get_object_stream(key)
            .await
            .map_err(|e| request_error(&target, e))?;
        check_status("GetObject", &target, response.status_code)?;

        let body = response
            .bytes
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Box::new(StreamReader::new(body)))
    }

    async fn put_object(&self, bucket_name: &str, key: &str, body: &mut ObjectStream) -> FsResult<()> {
        let bucket = self.bucket(bucket_name)?;

        tracing::debug!("S3 PutObject start: {}/{}", bucket_name, key);
        let response = bucket
            .put_object_stream(body, key)
            .await
            .map_err(FsError::backend)?;

        let code = response.status_code();
        if !is_success(code) {
            return Err(FsError::backend_msg(format!(
                "S3 PutObject {}/{} returned {}",
                bucket_name, key, code
            )));
        }
        tracing::debug!("S3 PutObject done: {}/{}", bucket_name, key);
        Ok(())
    }

    async fn delete_object(&self, bucket_name: &str, key: &str) -> FsResult<()> {
        let bucket = self.bucket(bucket_name)?;
        let response = bucket
            .delete_object(key)
            .await
            .map_err(FsError::backend)?;

        check_deleted(&format!("{}/{}", bucket_name, key), response.status_code())
    }

    async fn head_object(&self, bucket_name: &str, key: &str) -> FsResult<Option<ObjectSummary>> {
        let bucket = self.bucket(bucket_name)?;
        let response = bucket.head_object(key).await;
        summary_from_head(&format!("{}/{}", bucket_name, key), key, response)
    }

    fn shutdown(&self) {
        // rust-s3 holds no pooled connections per client that need explicit release
        tracing::debug!("S3 client for {:?} released", self.region);
    }
}
