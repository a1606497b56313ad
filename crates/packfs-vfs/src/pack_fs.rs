//! Archive-backed source
//!
//! Every handle holds an [`Arc`] of the loaded [`PackReader`] plus a record
//! index. The index is immutable once loaded, so lookups and reads through
//! any number of handles need no locking beyond what the reader's payload
//! source does per read.

use crate::config::VfsConfig;
use crate::fs::{DirEntry, SourceKind, VirtualDirectory, VirtualFile, VirtualFileSystem};
use crate::{VfsError, VfsResult};
use packfs_formats::pack::{EntryKind, EntryRecord, PackReader, ROOT_INDEX};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A mounted pack archive
#[derive(Debug, Clone)]
pub struct PackFileSystem {
    reader: Arc<PackReader>,
}

impl PackFileSystem {
    /// Open and validate the pack at `path`
    pub fn open(path: impl AsRef<Path>, config: &VfsConfig) -> VfsResult<Self> {
        let reader = PackReader::open(path, &config.pack_options())?;
        Ok(Self::from_reader(Arc::new(reader)))
    }

    /// Wrap an already opened reader
    pub const fn from_reader(reader: Arc<PackReader>) -> Self {
        Self { reader }
    }

    /// The shared archive index
    pub const fn reader(&self) -> &Arc<PackReader> {
        &self.reader
    }

    /// Root directory handle
    pub fn root(&self) -> Box<dyn VirtualDirectory> {
        Box::new(PackDirectory::new(Arc::clone(&self.reader), ROOT_INDEX))
    }

    /// Verify the archive checksum, returning it on success
    pub fn verify(&self) -> VfsResult<u32> {
        Ok(self.reader.verify_checksum()?)
    }

    /// Resolve `path` and require the final record to be of kind `kind`
    fn lookup(&self, path: &str, kind: EntryKind) -> VfsResult<usize> {
        let index = self
            .reader
            .resolve(path)
            .ok_or_else(|| VfsError::not_found(path))?;

        match self.reader.record(index) {
            Some(record) if record.kind == kind => {
                debug!("Resolved {} to record {}", path, index);
                Ok(index)
            }
            _ => Err(VfsError::not_found(path)),
        }
    }
}

impl VirtualFileSystem for PackFileSystem {
    fn kind(&self) -> SourceKind {
        SourceKind::Pack
    }

    fn open_file(&self, path: &str) -> VfsResult<Box<dyn VirtualFile>> {
        let index = self.lookup(path, EntryKind::File)?;
        Ok(Box::new(PackFile::new(Arc::clone(&self.reader), index)))
    }

    fn open_directory(&self, path: &str) -> VfsResult<Box<dyn VirtualDirectory>> {
        let index = self.lookup(path, EntryKind::Directory)?;
        Ok(Box::new(PackDirectory::new(Arc::clone(&self.reader), index)))
    }
}

/// File record inside a pack
#[derive(Debug)]
struct PackFile {
    reader: Arc<PackReader>,
    index: usize,
    name: String,
    size: u64,
}

impl PackFile {
    fn new(reader: Arc<PackReader>, index: usize) -> Self {
        let name = reader.name(index);
        let size = reader.record(index).map_or(0, EntryRecord::file_size);
        Self {
            reader,
            index,
            name,
            size,
        }
    }
}

impl VirtualFile for PackFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        Ok(self.reader.read_at(self.index, offset, buf)?)
    }
}

/// Directory record inside a pack; children are a contiguous record range
#[derive(Debug)]
struct PackDirectory {
    reader: Arc<PackReader>,
    index: usize,
    name: String,
}

impl PackDirectory {
    fn new(reader: Arc<PackReader>, index: usize) -> Self {
        let name = reader.name(index);
        Self {
            reader,
            index,
            name,
        }
    }

    /// Record index of the child at position `index`
    fn child(&self, index: usize) -> Option<usize> {
        let range = self.reader.children(self.index);
        range.start.checked_add(index).filter(|child| range.contains(child))
    }

    fn count(&self, kind: EntryKind) -> usize {
        self.reader
            .children(self.index)
            .filter(|&child| self.reader.record(child).is_some_and(|r| r.kind == kind))
            .count()
    }

    fn child_of_kind(&self, index: usize, kind: EntryKind) -> VfsResult<usize> {
        self.child(index)
            .filter(|&child| self.reader.record(child).is_some_and(|r| r.kind == kind))
            .ok_or_else(|| VfsError::not_found(format!("{}[{index}]", self.name)))
    }
}

impl VirtualDirectory for PackDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.reader.children(self.index).len()
    }

    fn num_files(&self) -> usize {
        self.count(EntryKind::File)
    }

    fn num_directories(&self) -> usize {
        self.count(EntryKind::Directory)
    }

    fn entry(&self, index: usize) -> Option<DirEntry> {
        let child = self.child(index)?;
        let record = self.reader.record(child)?;
        Some(DirEntry {
            name: self.reader.name(child),
            kind: record.kind,
            size: record.file_size(),
        })
    }

    fn find(&self, name: &str) -> Option<usize> {
        let start = self.reader.children(self.index).start;
        self.reader
            .find_child(self.index, name)
            .map(|child| child - start)
    }

    fn open_file_at(&self, index: usize) -> VfsResult<Box<dyn VirtualFile>> {
        let child = self.child_of_kind(index, EntryKind::File)?;
        Ok(Box::new(PackFile::new(Arc::clone(&self.reader), child)))
    }

    fn open_directory_at(&self, index: usize) -> VfsResult<Box<dyn VirtualDirectory>> {
        let child = self.child_of_kind(index, EntryKind::Directory)?;
        Ok(Box::new(PackDirectory::new(
            Arc::clone(&self.reader),
            child,
        )))
    }
}
