//! Source tree scanning
//!
//! Produces the breadth-first entry list the writer serializes: the root
//! directory first, then all of its children, then all grandchildren in the
//! order their parents were visited. Within one directory, sub-directories
//! come first and files second, each group sorted by file name so repeated
//! builds of the same tree are identical.

use crate::pack::entry::EntryKind;
use crate::pack::error::{PackError, PackResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Largest value the 32-bit size and child-count fields can hold
const MAX_FIELD: u64 = i32::MAX as u64;

/// One scanned file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    /// File or directory
    pub kind: EntryKind,
    /// Host path the entry was read from
    pub source: PathBuf,
    /// Name stored in the pack (empty for the root)
    pub name: String,
    /// Byte length of a file (0 for directories)
    pub size: u64,
    /// Number of immediate children of a directory (0 for files)
    pub child_count: usize,
}

impl ScanEntry {
    fn file(source: PathBuf, name: String, size: u64) -> Self {
        Self {
            kind: EntryKind::File,
            source,
            name,
            size,
            child_count: 0,
        }
    }

    fn directory(source: PathBuf, name: String, child_count: usize) -> Self {
        Self {
            kind: EntryKind::Directory,
            source,
            name,
            size: 0,
            child_count,
        }
    }
}

/// Breadth-first list of scanned entries, root at index 0
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedTree {
    /// Entries in record order
    pub entries: Vec<ScanEntry>,
}

impl ScannedTree {
    /// Number of entries, root included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the tree holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of file entries
    pub fn file_count(&self) -> usize {
        self.entries.iter().filter(|e| e.kind.is_file()).count()
    }

    /// Number of directory entries, root included
    pub fn directory_count(&self) -> usize {
        self.entries.iter().filter(|e| e.kind.is_directory()).count()
    }

    /// Sum of all file sizes
    pub fn payload_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// Scan `root` into a breadth-first entry list
///
/// A single file produces a synthetic, unnamed root directory holding that
/// one file. Symbolic links are not followed; links, devices, FIFOs and
/// sockets are skipped. Any I/O error aborts the scan.
pub fn scan_tree(root: impl AsRef<Path>) -> PackResult<ScannedTree> {
    let root = root.as_ref();
    let metadata = fs::metadata(root)?;

    if metadata.is_file() {
        let name = utf8_name(root)?;
        check_field(root, metadata.len())?;
        let parent = root.parent().map(Path::to_path_buf).unwrap_or_default();
        return Ok(ScannedTree {
            entries: vec![
                ScanEntry::directory(parent, String::new(), 1),
                ScanEntry::file(root.to_path_buf(), name, metadata.len()),
            ],
        });
    }

    if !metadata.is_dir() {
        return Err(PackError::InvalidRoot(root.to_path_buf()));
    }

    let mut entries = vec![ScanEntry::directory(root.to_path_buf(), String::new(), 0)];

    // Children are appended while walking, so visiting entries in index order
    // is exactly a breadth-first traversal.
    let mut cursor = 0;
    while cursor < entries.len() {
        if entries[cursor].kind.is_directory() {
            let children = list_children(&entries[cursor].source)?;
            check_field(&entries[cursor].source, children.len() as u64)?;
            entries[cursor].child_count = children.len();
            entries.extend(children);
        }
        cursor += 1;
    }

    debug!(
        "Scanned {} entries under {}",
        entries.len(),
        root.display()
    );

    Ok(ScannedTree { entries })
}

/// List the immediate children of `dir`: directories first, then files
fn list_children(dir: &Path) -> PackResult<Vec<ScanEntry>> {
    let mut directories = Vec::new();
    let mut files = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            let name = utf8_name(entry.path())?;
            directories.push(ScanEntry::directory(entry.into_path(), name, 0));
        } else if file_type.is_file() {
            let name = utf8_name(entry.path())?;
            let size = entry.metadata()?.len();
            check_field(entry.path(), size)?;
            files.push(ScanEntry::file(entry.into_path(), name, size));
        } else {
            warn!("Skipping special entry {}", entry.path().display());
        }
    }

    directories.append(&mut files);
    Ok(directories)
}

fn utf8_name(path: &Path) -> PackResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| PackError::InvalidName(path.to_path_buf()))
}

fn check_field(path: &Path, value: u64) -> PackResult<()> {
    if value > MAX_FIELD {
        return Err(PackError::EntryTooLarge {
            path: path.to_path_buf(),
            size: value,
        });
    }
    Ok(())
}
