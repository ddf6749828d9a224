//! S3驱动配置

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};
use crate::utils::with_scheme;

/// S3 compatible service family, used to derive endpoints / 服务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum S3Flavor {
    #[default]
    Aws,
    /// 阿里云OSS
    Oss,
    /// 腾讯云COS
    Cos,
    Minio,
}

/// S3配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// S3端点地址，留空时根据服务类型和区域推导
    /// AWS: https://s3.{region}.amazonaws.com
    /// 阿里云OSS: https://oss-{region}.aliyuncs.com
    /// 腾讯云COS: https://cos.{region}.myqcloud.com
    /// MinIO: http://localhost:9000
    #[serde(default)]
    pub endpoint: String,
    /// 区域
    #[serde(default = "default_region")]
    pub region: String,
    /// Access Key ID
    pub access_key_id: String,
    /// Secret Access Key
    pub secret_access_key: String,
    /// Session Token（用于临时凭证）
    #[serde(default)]
    pub session_token: String,
    #[serde(default)]
    pub flavor: S3Flavor,
    /// 强制使用路径风格（而非虚拟主机风格）
    /// MinIO等需要设置为true
    #[serde(default)]
    pub force_path_style: bool,
    /// 请求超时（秒）
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// 显式指定的存储桶（凭证没有 ListBuckets 权限时使用）
    #[serde(default)]
    pub buckets: Vec<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: default_region(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: String::new(),
            flavor: S3Flavor::default(),
            force_path_style: false,
            request_timeout_secs: None,
            buckets: Vec::new(),
        }
    }
}

impl S3Config {
    pub fn validate(&self) -> FsResult<()> {
        if self.access_key_id.trim().is_empty() || self.secret_access_key.trim().is_empty() {
            return Err(FsError::Config(
                "access_key_id and secret_access_key are required".to_string(),
            ));
        }
        if self.flavor == S3Flavor::Minio && self.endpoint.trim().is_empty() {
            return Err(FsError::Config("minio requires an endpoint".to_string()));
        }
        Ok(())
    }

    /// Endpoint serving `region`; an explicit endpoint always wins / 区域对应的端点
    pub fn endpoint_for(&self, region: &str) -> FsResult<String> {
        if !self.endpoint.trim().is_empty() {
            return Ok(with_scheme(&self.endpoint));
        }
        let region = if region.is_empty() { self.region.as_str() } else { region };
        match self.flavor {
            S3Flavor::Aws => Ok(format!("https://s3.{}.amazonaws.com", region)),
            S3Flavor::Oss => Ok(format!("https://oss-{}.aliyuncs.com", oss_region(region))),
            S3Flavor::Cos => Ok(format!("https://cos.{}.myqcloud.com", region)),
            S3Flavor::Minio => Err(FsError::Config("minio requires an endpoint".to_string())),
        }
    }

    /// Region named by a GetBucketLocation answer / 解析存储桶区域
    ///
    /// AWS answers an empty LocationConstraint for us-east-1 and `EU` for
    /// eu-west-1. OSS answers `oss-<region>`.
    pub fn region_from_location(&self, location: &str) -> String {
        let location = location.trim();
        // rust-s3 reports an unparsable body as "Custom"
        if location.is_empty() || location == "Custom" {
            if self.flavor == S3Flavor::Aws && self.endpoint.trim().is_empty() {
                return default_region();
            }
            return self.region.clone();
        }
        match self.flavor {
            S3Flavor::Aws if location == "EU" => "eu-west-1".to_string(),
            S3Flavor::Oss => oss_region(location).to_string(),
            _ => location.to_string(),
        }
    }
}

fn oss_region(region: &str) -> &str {
    region.strip_prefix("oss-").unwrap_or(region)
}
