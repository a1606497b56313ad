//! Entry record structures
//!
//! Each file or directory is described by one fixed-size 28-byte record. For a
//! directory, `payload_offset` is the index of its first child record and
//! `payload_size` the number of children. For a file, they are the byte offset
//! and length of its payload.

use binrw::{BinRead, BinWrite};

/// Entry record size in bytes
pub const RECORD_SIZE: u64 = 28;

/// Kind of a pack entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BinRead, BinWrite)]
#[br(repr = i32)]
#[bw(repr = i32)]
pub enum EntryKind {
    /// Regular file with a payload
    File = 0,
    /// Directory with a child range
    Directory = 1,
}

impl EntryKind {
    /// Check if this is a file
    pub const fn is_file(self) -> bool {
        matches!(self, Self::File)
    }

    /// Check if this is a directory
    pub const fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Directory => f.write_str("directory"),
        }
    }
}

/// One record of the entry table (28 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct EntryRecord {
    /// File or directory
    pub kind: EntryKind,
    /// Reserved, written as 0
    pub flags: i32,
    /// Name start in the name table, in UTF-16 code units
    pub name_offset: i32,
    /// Name length in UTF-16 code units
    pub name_length: i32,
    /// File byte length, or directory child count
    pub payload_size: i32,
    /// File payload offset, or index of a directory's first child
    pub payload_offset: i64,
}

impl EntryRecord {
    /// Create a file record
    pub const fn file(name_offset: i32, name_length: i32, size: i32, payload_offset: i64) -> Self {
        Self {
            kind: EntryKind::File,
            flags: 0,
            name_offset,
            name_length,
            payload_size: size,
            payload_offset,
        }
    }

    /// Create a directory record
    pub const fn directory(
        name_offset: i32,
        name_length: i32,
        child_count: i32,
        first_child: i64,
    ) -> Self {
        Self {
            kind: EntryKind::Directory,
            flags: 0,
            name_offset,
            name_length,
            payload_size: child_count,
            payload_offset: first_child,
        }
    }

    /// Check if this record is a file
    pub const fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Check if this record is a directory
    pub const fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    /// Number of children of a directory record (0 for files)
    pub fn child_count(&self) -> usize {
        if self.is_directory() {
            self.payload_size.max(0) as usize
        } else {
            0
        }
    }

    /// Index range of a directory's children (empty for files)
    pub fn child_range(&self) -> std::ops::Range<usize> {
        if self.is_directory() {
            let start = self.payload_offset.max(0) as usize;
            start..start + self.child_count()
        } else {
            0..0
        }
    }

    /// Byte size of a file record (0 for directories)
    pub fn file_size(&self) -> u64 {
        if self.is_file() {
            self.payload_size.max(0) as u64
        } else {
            0
        }
    }

    /// Code-unit range of this record's name in the name table
    pub fn name_range(&self) -> std::ops::Range<usize> {
        let start = self.name_offset.max(0) as usize;
        start..start + self.name_length.max(0) as usize
    }
}
