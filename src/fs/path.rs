//! Object path model / 对象路径模型
//!
//! A path is a list of name segments plus an absolute marker. The first segment of
//! an absolute path is the bucket, the rest form the object key. Paths are plain
//! values: attributes live in the provider's side table, never on the path.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{FsError, FsResult};

/// Path separator / 路径分隔符
pub const SEPARATOR: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPath {
    absolute: bool,
    names: Vec<String>,
}

impl ObjectPath {
    /// The root path `/` / 根路径
    pub fn root() -> Self {
        Self { absolute: true, names: Vec::new() }
    }

    /// Parse a path string; a leading `/` makes it absolute / 解析路径字符串
    pub fn parse(path: &str) -> Self {
        let absolute = path.starts_with(SEPARATOR);
        let names = path
            .split(SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { absolute, names }
    }

    pub fn from_names<I, S>(absolute: bool, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            absolute,
            names: names.into_iter().map(Into::into).filter(|s: &String| !s.is_empty()).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Root: absolute with no segments / 是否是根
    pub fn is_root(&self) -> bool {
        self.absolute && self.names.is_empty()
    }

    /// Exactly one segment below root / 是否是 Bucket
    pub fn is_bucket(&self) -> bool {
        self.absolute && self.names.len() == 1
    }

    /// Bucket name (first segment) / Bucket 名称
    pub fn bucket_name(&self) -> Option<&str> {
        if self.absolute {
            self.names.first().map(String::as_str)
        } else {
            None
        }
    }

    /// Object key inside the bucket / 在 Bucket 中的对象键
    pub fn object_name(&self) -> String {
        if self.names.len() <= 1 {
            return String::new();
        }
        self.names[1..].join(SEPARATOR)
    }

    /// Path of the bucket containing this path / 所在 Bucket 的路径
    pub fn bucket(&self) -> Option<ObjectPath> {
        self.bucket_name()
            .map(|name| ObjectPath::from_names(true, [name]))
    }

    /// Last segment / 文件名
    pub fn file_name(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }

    /// Parent path; root and single-segment relative paths have none / 父路径
    pub fn parent(&self) -> Option<ObjectPath> {
        if self.names.is_empty() {
            return None;
        }
        if !self.absolute && self.names.len() == 1 {
            return None;
        }
        Some(Self {
            absolute: self.absolute,
            names: self.names[..self.names.len() - 1].to_vec(),
        })
    }

    /// Resolve a string against this path / 解析子路径
    ///
    /// An absolute `other` replaces this path, a relative one is appended.
    pub fn resolve(&self, other: &str) -> ObjectPath {
        self.resolve_path(&ObjectPath::parse(other))
    }

    pub fn resolve_path(&self, other: &ObjectPath) -> ObjectPath {
        if other.absolute {
            return other.clone();
        }
        let mut names = self.names.clone();
        names.extend(other.names.iter().cloned());
        Self { absolute: self.absolute, names }
    }

    /// Relative path from this path to `other` / 计算相对路径
    pub fn relativize(&self, other: &ObjectPath) -> FsResult<ObjectPath> {
        if self.absolute != other.absolute {
            return Err(FsError::InvalidPath(format!(
                "cannot relativize '{}' against '{}'",
                other, self
            )));
        }
        let common = self
            .names
            .iter()
            .zip(other.names.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let mut names: Vec<String> = std::iter::repeat("..".to_string())
            .take(self.names.len() - common)
            .collect();
        names.extend(other.names[common..].iter().cloned());
        Ok(Self { absolute: false, names })
    }

    /// Remove `.` segments and fold `..` / 规范化
    ///
    /// `..` above an absolute root is dropped; leading `..` of a relative path
    /// is kept.
    pub fn normalize(&self) -> ObjectPath {
        let mut names: Vec<String> = Vec::with_capacity(self.names.len());
        for name in &self.names {
            match name.as_str() {
                "." => {}
                ".." => match names.last() {
                    Some(last) if last != ".." => {
                        names.pop();
                    }
                    _ if self.absolute => {}
                    _ => names.push(name.clone()),
                },
                _ => names.push(name.clone()),
            }
        }
        Self { absolute: self.absolute, names }
    }

    pub fn starts_with(&self, other: &ObjectPath) -> bool {
        self.absolute == other.absolute
            && self.names.len() >= other.names.len()
            && self.names.iter().zip(other.names.iter()).all(|(a, b)| a == b)
    }

    /// Resolve against root if relative / 转换为绝对路径
    pub fn to_absolute(&self) -> ObjectPath {
        if self.absolute {
            self.clone()
        } else {
            ObjectPath::root().resolve_path(self)
        }
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            f.write_str(SEPARATOR)?;
        }
        f.write_str(&self.names.join(SEPARATOR))
    }
}

/// Basic file attributes / 基本文件属性
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileAttributes {
    pub directory: bool,
    pub regular_file: bool,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileAttributes {
    pub fn directory(last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            directory: true,
            regular_file: false,
            size: 0,
            last_modified,
        }
    }

    pub fn file(size: u64, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            directory: false,
            regular_file: true,
            size,
            last_modified,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.directory
    }

    pub fn is_regular_file(&self) -> bool {
        self.regular_file
    }
}

/// One child returned by a directory listing / 目录条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: ObjectPath,
    pub attributes: FileAttributes,
}

impl DirEntry {
    pub fn new(path: ObjectPath, attributes: FileAttributes) -> Self {
        Self { path, attributes }
    }

    pub fn name(&self) -> &str {
        self.path.file_name().unwrap_or(SEPARATOR)
    }
}
