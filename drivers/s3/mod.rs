//! S3 兼容对象存储后端（AWS S3、阿里云OSS、腾讯云COS、MinIO）

mod config;
mod driver;
mod factory;

pub use config::{S3Config, S3Flavor};
pub use driver::{S3Connector, S3RegionClient};
pub use factory::S3ConnectorFactory;
