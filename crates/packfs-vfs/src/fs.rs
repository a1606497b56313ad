//! File and directory capability traits
//!
//! Every mounted source implements [`VirtualFileSystem`]. Opened handles are
//! trait objects that own whatever they need to keep reading, so they stay
//! valid after the source that produced them is unmounted. Closing a handle
//! is dropping it.

use crate::{VfsError, VfsResult};
use packfs_formats::pack::EntryKind;
use std::fmt;

/// Backing store of a mounted source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Pack archive
    Pack,
    /// Directory on the native filesystem
    Host,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pack => f.write_str("pack"),
            Self::Host => f.write_str("os"),
        }
    }
}

/// One child of a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Name within the parent directory
    pub name: String,
    /// File or directory
    pub kind: EntryKind,
    /// Byte length of a file, 0 for directories
    pub size: u64,
}

/// A source that can open files and directories by path
///
/// Paths are `/`-delimited; a leading `/` and empty segments are ignored,
/// so `""` and `"/"` both name the root directory.
pub trait VirtualFileSystem: Send + Sync + fmt::Debug {
    /// Backing store of this source
    fn kind(&self) -> SourceKind;

    /// Open the file at `path`
    ///
    /// Returns [`VfsError::NotFound`] if the path is absent or names a
    /// directory.
    fn open_file(&self, path: &str) -> VfsResult<Box<dyn VirtualFile>>;

    /// Open the directory at `path`
    ///
    /// Returns [`VfsError::NotFound`] if the path is absent or names a file.
    fn open_directory(&self, path: &str) -> VfsResult<Box<dyn VirtualDirectory>>;
}

/// An open, read-only file
pub trait VirtualFile: Send + Sync + fmt::Debug {
    /// Name of the file within its directory
    fn name(&self) -> &str;

    /// Size in bytes
    fn size(&self) -> u64;

    /// Read up to `buf.len()` bytes starting at `offset`
    ///
    /// Returns the number of bytes read: short at end of file, 0 at or past
    /// it. Does not move any shared cursor, so concurrent calls on the same
    /// handle are independent.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize>;

    /// Read the whole file
    fn read_to_vec(&self) -> VfsResult<Vec<u8>> {
        let mut data = vec![0u8; usize::try_from(self.size()).unwrap_or(usize::MAX)];
        let mut filled = 0;
        while filled < data.len() {
            let n = self.read_at(filled as u64, &mut data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data.truncate(filled);
        Ok(data)
    }
}

/// An open directory with a fixed, indexable child list
///
/// Indices run over the combined child list: sub-directories first, then
/// files.
pub trait VirtualDirectory: Send + Sync + fmt::Debug {
    /// Name of the directory (empty for a source root)
    fn name(&self) -> &str;

    /// Number of children
    fn len(&self) -> usize;

    /// Check if the directory has no children
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of file children
    fn num_files(&self) -> usize;

    /// Number of directory children
    fn num_directories(&self) -> usize;

    /// Child at `index`
    fn entry(&self, index: usize) -> Option<DirEntry>;

    /// Index of the child called `name` (exact match)
    fn find(&self, name: &str) -> Option<usize>;

    /// Open the child at `index` as a file
    fn open_file_at(&self, index: usize) -> VfsResult<Box<dyn VirtualFile>>;

    /// Open the child at `index` as a directory
    fn open_directory_at(&self, index: usize) -> VfsResult<Box<dyn VirtualDirectory>>;

    /// Open the file child called `name`
    fn open_file(&self, name: &str) -> VfsResult<Box<dyn VirtualFile>> {
        let index = self.find(name).ok_or_else(|| VfsError::not_found(name))?;
        self.open_file_at(index)
    }

    /// Open the directory child called `name`
    fn open_directory(&self, name: &str) -> VfsResult<Box<dyn VirtualDirectory>> {
        let index = self.find(name).ok_or_else(|| VfsError::not_found(name))?;
        self.open_directory_at(index)
    }

    /// All children in index order
    fn entries(&self) -> Vec<DirEntry> {
        (0..self.len()).filter_map(|index| self.entry(index)).collect()
    }
}
