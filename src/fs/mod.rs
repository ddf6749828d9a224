//! Hierarchical view over object storage / 对象存储的层级文件系统视图

pub mod channel;
pub mod filesystem;
pub mod path;
pub mod provider;
pub mod walker;

pub use channel::{ByteChannel, OpenOption, ReadChannel, WriteChannel};
pub use filesystem::{FileSystemOptions, ObjectFileSystem};
pub use path::{DirEntry, FileAttributes, ObjectPath, SEPARATOR};
pub use provider::{DirectoryStream, FileSystemProvider, LIST_PAGE_SIZE};
pub use walker::{walk_file_tree, PathVisitor, VisitResult};
