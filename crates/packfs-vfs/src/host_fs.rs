//! Native filesystem source
//!
//! A thin pass-through rooted at one host directory. Paths never leave the
//! root: `.` and `..` segments (and segments containing `\`) are refused, and
//! symbolic links, devices and other special entries are treated as absent.

use crate::fs::{DirEntry, SourceKind, VirtualDirectory, VirtualFile, VirtualFileSystem};
use crate::{VfsError, VfsResult};
use packfs_formats::pack::{EntryKind, path_segments};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A mounted host directory
#[derive(Debug, Clone)]
pub struct HostFileSystem {
    root: PathBuf,
}

impl HostFileSystem {
    /// Mount the directory at `root`
    ///
    /// Fails with [`VfsError::Mount`] unless `root` is an existing directory.
    pub fn new(root: impl AsRef<Path>) -> VfsResult<Self> {
        let root = root.as_ref();
        match fs::metadata(root) {
            Ok(metadata) if metadata.is_dir() => Ok(Self {
                root: root.to_path_buf(),
            }),
            Ok(_) => Err(VfsError::mount(
                root,
                VfsError::not_found(format!("{} is not a directory", root.display())),
            )),
            Err(e) => Err(VfsError::mount(root, VfsError::Io(e))),
        }
    }

    /// Root directory of this source
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a virtual path onto the host, refusing anything that could escape
    ///
    /// Every component before the last must be a plain directory; a symlink
    /// anywhere along the way is NotFound. The last component is checked by
    /// the caller against the kind it wants.
    fn host_path(&self, path: &str) -> VfsResult<PathBuf> {
        let segments: Vec<&str> = path_segments(path).collect();
        let mut host = self.root.clone();

        for (position, segment) in segments.iter().enumerate() {
            if *segment == "." || *segment == ".." || segment.contains('\\') {
                return Err(VfsError::not_found(path));
            }
            host.push(segment);

            if position + 1 < segments.len() {
                let metadata = fs::symlink_metadata(&host).map_err(|e| map_io(e, path))?;
                if !metadata.is_dir() {
                    return Err(VfsError::not_found(path));
                }
            }
        }
        Ok(host)
    }
}

impl VirtualFileSystem for HostFileSystem {
    fn kind(&self) -> SourceKind {
        SourceKind::Host
    }

    fn open_file(&self, path: &str) -> VfsResult<Box<dyn VirtualFile>> {
        let host = self.host_path(path)?;
        let name = path_segments(path).last().unwrap_or_default().to_string();
        if name.is_empty() {
            return Err(VfsError::not_found(path));
        }
        Ok(Box::new(HostFile::open(&host, name, path)?))
    }

    fn open_directory(&self, path: &str) -> VfsResult<Box<dyn VirtualDirectory>> {
        let host = self.host_path(path)?;
        let name = path_segments(path).last().unwrap_or_default().to_string();
        Ok(Box::new(HostDirectory::open(host, name, path)?))
    }
}

/// Translate a host error for `path`: absent targets are [`VfsError::NotFound`]
fn map_io(error: io::Error, path: &str) -> VfsError {
    match error.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => VfsError::not_found(path),
        _ => VfsError::Io(error),
    }
}

/// Regular host file, read through one handle under a lock
#[derive(Debug)]
struct HostFile {
    name: String,
    size: u64,
    file: Mutex<File>,
}

impl HostFile {
    fn open(host: &Path, name: String, path: &str) -> VfsResult<Self> {
        let metadata = fs::symlink_metadata(host).map_err(|e| map_io(e, path))?;
        if !metadata.is_file() {
            return Err(VfsError::not_found(path));
        }
        let file = File::open(host).map_err(|e| map_io(e, path))?;
        Ok(Self {
            name,
            size: metadata.len(),
            file: Mutex::new(file),
        })
    }
}

impl VirtualFile for HostFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        if offset >= self.size || buf.is_empty() {
            return Ok(0);
        }
        let len = (self.size - offset).min(buf.len() as u64) as usize;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < len {
            match file.read(&mut buf[filled..len]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

/// Listing entry captured when the directory was opened
#[derive(Debug, Clone)]
struct HostEntry {
    entry: DirEntry,
    path: PathBuf,
}

/// Host directory with its listing snapshotted at open time
#[derive(Debug)]
struct HostDirectory {
    name: String,
    entries: Vec<HostEntry>,
    directories: usize,
}

impl HostDirectory {
    fn open(host: PathBuf, name: String, path: &str) -> VfsResult<Self> {
        let metadata = fs::symlink_metadata(&host).map_err(|e| map_io(e, path))?;
        if !metadata.is_dir() {
            return Err(VfsError::not_found(path));
        }

        let mut directories = Vec::new();
        let mut files = Vec::new();
        let walker = WalkDir::new(&host)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io) => map_io(io, path),
                None => VfsError::not_found(path),
            })?;
            let Some(child_name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!("Skipping non UTF-8 name {}", entry.path().display());
                continue;
            };
            let file_type = entry.file_type();

            if file_type.is_dir() {
                directories.push(HostEntry {
                    entry: DirEntry {
                        name: child_name,
                        kind: EntryKind::Directory,
                        size: 0,
                    },
                    path: entry.into_path(),
                });
            } else if file_type.is_file() {
                let size = entry.metadata().map_or(0, |m| m.len());
                files.push(HostEntry {
                    entry: DirEntry {
                        name: child_name,
                        kind: EntryKind::File,
                        size,
                    },
                    path: entry.into_path(),
                });
            } else {
                debug!("Skipping special entry {}", entry.path().display());
            }
        }

        let count = directories.len();
        directories.append(&mut files);
        Ok(Self {
            name,
            entries: directories,
            directories: count,
        })
    }

    fn child(&self, index: usize, kind: EntryKind) -> VfsResult<&HostEntry> {
        self.entries
            .get(index)
            .filter(|child| child.entry.kind == kind)
            .ok_or_else(|| VfsError::not_found(format!("{}[{index}]", self.name)))
    }
}

impl VirtualDirectory for HostDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn num_files(&self) -> usize {
        self.entries.len() - self.directories
    }

    fn num_directories(&self) -> usize {
        self.directories
    }

    fn entry(&self, index: usize) -> Option<DirEntry> {
        self.entries.get(index).map(|child| child.entry.clone())
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|child| child.entry.name == name)
    }

    fn open_file_at(&self, index: usize) -> VfsResult<Box<dyn VirtualFile>> {
        let child = self.child(index, EntryKind::File)?;
        let name = child.entry.name.clone();
        Ok(Box::new(HostFile::open(&child.path, name, &child.entry.name)?))
    }

    fn open_directory_at(&self, index: usize) -> VfsResult<Box<dyn VirtualDirectory>> {
        let child = self.child(index, EntryKind::Directory)?;
        let name = child.entry.name.clone();
        Ok(Box::new(HostDirectory::open(
            child.path.clone(),
            name,
            &child.entry.name,
        )?))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_root() -> (tempfile::TempDir, HostFileSystem) {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("sub/nested")).unwrap();
        fs::create_dir_all(root.join("alpha")).unwrap();
        fs::write(root.join("zeta.txt"), b"last").unwrap();
        fs::write(root.join("beta.txt"), b"second").unwrap();
        fs::write(root.join("sub/item.bin"), b"0123456789").unwrap();
        fs::write(dir.path().join("secret.txt"), b"outside").unwrap();
        let host = HostFileSystem::new(&root).expect("Operation should succeed");
        (dir, host)
    }

    #[test]
    fn test_new_requires_directory() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();

        assert!(matches!(
            HostFileSystem::new(&file),
            Err(VfsError::Mount { .. })
        ));
        assert!(matches!(
            HostFileSystem::new(dir.path().join("missing")),
            Err(VfsError::Mount { .. })
        ));
    }

    #[test]
    fn test_open_and_read_file() {
        let (_dir, host) = sample_root();

        let file = host.open_file("/sub/item.bin").unwrap();
        assert_eq!(file.name(), "item.bin");
        assert_eq!(file.size(), 10);

        let mut buf = [0u8; 4];
        assert_eq!(file.read_at(8, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(file.read_at(10, &mut buf).unwrap(), 0);
        assert_eq!(file.read_to_vec().unwrap(), b"0123456789");
    }

    #[test]
    fn test_kind_mismatch_and_missing() {
        let (_dir, host) = sample_root();

        assert!(host.open_file("sub").unwrap_err().is_not_found());
        assert!(host.open_directory("beta.txt").unwrap_err().is_not_found());
        assert!(host.open_file("beta.txt/inner").unwrap_err().is_not_found());
        assert!(host.open_file("nope.txt").unwrap_err().is_not_found());
        assert!(host.open_file("").unwrap_err().is_not_found());
    }

    #[test]
    fn test_cannot_escape_root() {
        let (_dir, host) = sample_root();

        assert!(host.open_file("../secret.txt").unwrap_err().is_not_found());
        assert!(host.open_file("sub/../../secret.txt").unwrap_err().is_not_found());
        assert!(host.open_directory("./sub").unwrap_err().is_not_found());
    }

    #[test]
    fn test_listing_is_directories_then_files_sorted() {
        let (_dir, host) = sample_root();

        for path in ["", "/", "//"] {
            let root = host.open_directory(path).unwrap();
            let names: Vec<String> = root.entries().into_iter().map(|e| e.name).collect();
            assert_eq!(names, vec!["alpha", "sub", "beta.txt", "zeta.txt"]);
            assert_eq!(root.num_directories(), 2);
            assert_eq!(root.num_files(), 2);
        }

        let root = host.open_directory("").unwrap();
        assert_eq!(root.name(), "");
        assert_eq!(root.find("zeta.txt"), Some(3));
        assert_eq!(root.entry(2).unwrap().size, 6);
        assert_eq!(root.open_file("beta.txt").unwrap().read_to_vec().unwrap(), b"second");
        assert!(root.open_file_at(0).unwrap_err().is_not_found());

        let sub = root.open_directory("sub").unwrap();
        assert_eq!(sub.name(), "sub");
        assert_eq!(sub.len(), 2);
        assert!(sub.open_directory_at(0).unwrap().is_empty());
    }

    #[test]
    fn test_listing_is_a_snapshot() {
        let (dir, host) = sample_root();
        let root = host.open_directory("").unwrap();
        fs::write(dir.path().join("root/late.txt"), b"late").unwrap();

        assert_eq!(root.len(), 4);
        assert_eq!(host.open_directory("").unwrap().len(), 5);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_absent() {
        let (dir, host) = sample_root();
        std::os::unix::fs::symlink(dir.path().join("secret.txt"), host.root().join("link.txt"))
            .unwrap();

        assert!(host.open_file("link.txt").unwrap_err().is_not_found());
        let root = host.open_directory("").unwrap();
        assert_eq!(root.find("link.txt"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_is_absent() {
        let (dir, host) = sample_root();
        let outside = dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("secret.txt"), b"outside").unwrap();
        fs::create_dir(outside.join("deeper")).unwrap();
        std::os::unix::fs::symlink(&outside, host.root().join("linkdir")).unwrap();

        let root = host.open_directory("").unwrap();
        assert_eq!(root.find("linkdir"), None);
        assert!(host.open_directory("linkdir").unwrap_err().is_not_found());
        assert!(host.open_file("linkdir/secret.txt").unwrap_err().is_not_found());
        assert!(host.open_directory("linkdir/deeper").unwrap_err().is_not_found());

        // A file used as an intermediate component is absent too
        assert!(host.open_file("beta.txt/secret.txt").unwrap_err().is_not_found());
        // Plain nested directories still resolve
        assert_eq!(host.open_file("sub/item.bin").unwrap().size(), 10);
    }
}
