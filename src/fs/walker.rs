//! Depth-first tree walk / 目录树遍历
//!
//! Pre-order over directories, post-order callback after their children. Uses an
//! explicit stack of open listings, so deep trees do not grow the call stack.

use super::path::{DirEntry, FileAttributes, ObjectPath};
use super::provider::FileSystemProvider;
use crate::error::{FsError, FsResult};

/// What the walker does after a callback / 遍历控制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    Continue,
    /// Do not enter this directory (only meaningful from `pre_visit_directory`)
    SkipSubtree,
    /// Skip the remaining entries of the current directory
    SkipSiblings,
    Terminate,
}

/// Walk callbacks / 遍历回调
pub trait PathVisitor {
    fn pre_visit_directory(&mut self, _dir: &ObjectPath, _attributes: &FileAttributes) -> FsResult<VisitResult> {
        Ok(VisitResult::Continue)
    }

    fn visit_file(&mut self, file: &ObjectPath, attributes: &FileAttributes) -> FsResult<VisitResult>;

    fn visit_file_failed(&mut self, _path: &ObjectPath, error: FsError) -> FsResult<VisitResult> {
        Err(error)
    }

    /// `error` is set when the directory could not be listed
    fn post_visit_directory(&mut self, _dir: &ObjectPath, error: Option<FsError>) -> FsResult<VisitResult> {
        match error {
            Some(e) => Err(e),
            None => Ok(VisitResult::Continue),
        }
    }
}

struct Frame {
    dir: ObjectPath,
    depth: usize,
    entries: std::vec::IntoIter<DirEntry>,
}

/// Walk the tree under `start` / 遍历目录树
///
/// Directories at `max_depth` are reported through `visit_file`, as are plain
/// objects. Listing failures go to `post_visit_directory`.
pub async fn walk_file_tree<V>(
    provider: &FileSystemProvider,
    start: &ObjectPath,
    max_depth: usize,
    visitor: &mut V,
) -> FsResult<()>
where
    V: PathVisitor + ?Sized,
{
    let start = start.to_absolute();
    let attributes = match provider.read_attributes(&start).await {
        Ok(attributes) => attributes,
        Err(e) => {
            visitor.visit_file_failed(&start, e)?;
            return Ok(());
        }
    };

    if !attributes.is_directory() || max_depth == 0 {
        visitor.visit_file(&start, &attributes)?;
        return Ok(());
    }

    let mut stack: Vec<Frame> = Vec::new();
    if open_directory(provider, visitor, &mut stack, start, &attributes, 0).await? == VisitResult::Terminate {
        return Ok(());
    }

    loop {
        let next = match stack.last_mut() {
            None => break,
            Some(frame) => frame.entries.next().map(|entry| (entry, frame.depth + 1)),
        };

        let result = match next {
            None => {
                let frame = match stack.pop() {
                    Some(frame) => frame,
                    None => break,
                };
                visitor.post_visit_directory(&frame.dir, None)?
            }
            Some((entry, depth)) if entry.attributes.is_directory() && depth < max_depth => {
                open_directory(provider, visitor, &mut stack, entry.path, &entry.attributes, depth).await?
            }
            Some((entry, _)) => visitor.visit_file(&entry.path, &entry.attributes)?,
        };

        match result {
            VisitResult::Terminate => return Ok(()),
            VisitResult::SkipSiblings => {
                if let Some(frame) = stack.last_mut() {
                    frame.entries = Vec::new().into_iter();
                }
            }
            VisitResult::Continue | VisitResult::SkipSubtree => {}
        }
    }
    Ok(())
}

/// Pre-visit and list one directory; pushes a frame when it is entered
async fn open_directory<V>(
    provider: &FileSystemProvider,
    visitor: &mut V,
    stack: &mut Vec<Frame>,
    dir: ObjectPath,
    attributes: &FileAttributes,
    depth: usize,
) -> FsResult<VisitResult>
where
    V: PathVisitor + ?Sized,
{
    match visitor.pre_visit_directory(&dir, attributes)? {
        VisitResult::Continue => {}
        VisitResult::SkipSubtree => return Ok(VisitResult::Continue),
        other => return Ok(other),
    }

    match provider.fetch_children(&dir).await {
        Ok(children) => {
            stack.push(Frame {
                dir,
                depth,
                entries: children.into_iter(),
            });
            Ok(VisitResult::Continue)
        }
        Err(e) => visitor.post_visit_directory(&dir, Some(e)),
    }
}
