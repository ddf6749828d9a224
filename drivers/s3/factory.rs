//! S3连接器工厂

use std::sync::Arc;

use serde_json::Value;

use super::config::S3Config;
use super::driver::S3Connector;
use crate::error::{FsError, FsResult};
use crate::storage::{ClientConnector, ConnectorFactory};

/// S3连接器工厂
pub struct S3ConnectorFactory;

impl ConnectorFactory for S3ConnectorFactory {
    fn backend_type(&self) -> &'static str {
        "s3"
    }

    fn create_connector(&self, options: Value) -> FsResult<Arc<dyn ClientConnector>> {
        let config: S3Config = serde_json::from_value(options)
            .map_err(|e| FsError::Config(format!("配置解析失败: {}", e)))?;
        Ok(Arc::new(S3Connector::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_connector() {
        let connector = S3ConnectorFactory
            .create_connector(serde_json::json!({
                "access_key_id": "ak",
                "secret_access_key": "sk",
                "flavor": "oss",
                "region": "cn-hangzhou"
            }))
            .unwrap();
        assert_eq!(connector.name(), "s3");
    }

    #[test]
    fn test_rejects_bad_options() {
        let err = S3ConnectorFactory
            .create_connector(serde_json::json!({ "region": 5 }))
            .err()
            .unwrap();
        assert!(matches!(err, FsError::Config(_)));

        let err = S3ConnectorFactory
            .create_connector(serde_json::json!({
                "access_key_id": "ak",
                "secret_access_key": "sk",
                "flavor": "minio"
            }))
            .err()
            .unwrap();
        assert!(matches!(err, FsError::Config(_)));
    }
}
