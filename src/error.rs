//! Error types / 错误类型
//!
//! Every failure of the file system layer falls into one of a few families:
//! configuration, backend, not-found, closed-state and unsupported operation.

use std::sync::Arc;

/// Result alias used throughout the crate / 结果别名
pub type FsResult<T> = std::result::Result<T, FsError>;

/// File system error / 文件系统错误
///
/// `Clone` so that a failure captured by an upload worker can be reported both
/// from the next `write` and from `close`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FsError {
    /// Bucket name not present in the session's bucket list / 未知的存储桶
    #[error("unknown bucket: {0}")]
    UnknownBucket(String),

    /// Invalid or incomplete configuration / 配置错误
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Error raised by the backend client, passed through unchanged / 后端错误
    #[error("{0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),

    /// Object or directory does not exist / 文件不存在
    #[error("no such file: {0}")]
    NotFound(String),

    /// Operation attempted after close / 已关闭
    #[error("{0} already closed")]
    Closed(&'static str),

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("i/o error: {0}")]
    Io(Arc<std::io::Error>),
}

impl FsError {
    /// Wrap a native backend error / 包装后端原生错误
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FsError::Backend(Arc::new(err))
    }

    /// Backend error from a plain message (status codes without a typed error)
    pub fn backend_msg(msg: impl Into<String>) -> Self {
        FsError::backend(std::io::Error::new(std::io::ErrorKind::Other, msg.into()))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, FsError::Closed(_))
    }
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        FsError::Io(Arc::new(err))
    }
}

impl From<FsError> for std::io::Error {
    fn from(err: FsError) -> Self {
        use std::io::ErrorKind;
        let kind = match &err {
            FsError::NotFound(_) => ErrorKind::NotFound,
            FsError::Unsupported(_) => ErrorKind::Unsupported,
            FsError::Closed(_) => ErrorKind::BrokenPipe,
            FsError::InvalidPath(_) | FsError::UnknownBucket(_) | FsError::Config(_) => {
                ErrorKind::InvalidInput
            }
            FsError::Io(io) => io.kind(),
            FsError::Backend(_) => ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}
