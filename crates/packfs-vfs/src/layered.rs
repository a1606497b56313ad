//! Mount list and override resolution
//!
//! A [`LayeredFileSystem`] owns an ordered list of mounted sources. Lookups
//! walk the list from the most recent mount to the oldest and return the
//! first success, so a later mount shadows every earlier mount holding the
//! same path.

use crate::config::{MountPlan, MountSpec, VfsConfig};
use crate::fs::{SourceKind, VirtualDirectory, VirtualFile, VirtualFileSystem};
use crate::host_fs::HostFileSystem;
use crate::pack_fs::PackFileSystem;
use crate::{VfsError, VfsResult};
use packfs_formats::pack::EntryKind;
use std::path::Path;
use tracing::{debug, info, warn};

/// One mounted source
#[derive(Debug)]
pub struct Mount {
    source: Box<dyn VirtualFileSystem>,
    label: String,
}

impl Mount {
    /// Human-readable name of the mount, usually its target path
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Backing store of the mount
    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    /// The mounted source
    pub fn source(&self) -> &dyn VirtualFileSystem {
        self.source.as_ref()
    }
}

/// Where and what a path resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Index of the serving mount
    pub mount: usize,
    /// File or directory
    pub kind: EntryKind,
    /// Byte length of a file, child count of a directory
    pub size: u64,
}

/// Ordered set of mounted sources searched most-recent-first
#[derive(Debug, Default)]
pub struct LayeredFileSystem {
    mounts: Vec<Mount>,
    config: VfsConfig,
}

impl LayeredFileSystem {
    /// Create an empty filesystem with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty filesystem whose pack mounts use `config`
    pub fn with_config(config: VfsConfig) -> Self {
        Self {
            mounts: Vec::new(),
            config,
        }
    }

    /// Build a filesystem by applying every mount of `plan` in order
    ///
    /// Stops at the first mount that fails.
    pub fn from_plan(plan: &MountPlan) -> VfsResult<Self> {
        let mut vfs = Self::with_config(plan.config);
        for spec in &plan.mounts {
            vfs.mount_spec(spec)?;
        }
        Ok(vfs)
    }

    /// Configuration applied to pack mounts
    pub const fn config(&self) -> &VfsConfig {
        &self.config
    }

    /// Mount a host directory; returns its mount index
    pub fn mount_os(&mut self, root: impl AsRef<Path>) -> VfsResult<usize> {
        let root = root.as_ref();
        let source = HostFileSystem::new(root)?;
        Ok(self.mount(Box::new(source), root.display().to_string()))
    }

    /// Mount a pack archive; returns its mount index
    ///
    /// The archive is fully validated (and its checksum verified when the
    /// configuration asks for it) before anything is added.
    pub fn mount_pack(&mut self, path: impl AsRef<Path>) -> VfsResult<usize> {
        let path = path.as_ref();
        let source =
            PackFileSystem::open(path, &self.config).map_err(|e| VfsError::mount(path, e))?;
        Ok(self.mount(Box::new(source), path.display().to_string()))
    }

    /// Mount whatever `spec` describes
    pub fn mount_spec(&mut self, spec: &MountSpec) -> VfsResult<usize> {
        match spec {
            MountSpec::Os { path } => self.mount_os(path),
            MountSpec::Pack { path } => self.mount_pack(path),
        }
    }

    /// Mount any source; returns its mount index
    pub fn mount(&mut self, source: Box<dyn VirtualFileSystem>, label: impl Into<String>) -> usize {
        let label = label.into();
        let index = self.mounts.len();
        info!("Mounted {} source {} at index {}", source.kind(), label, index);
        self.mounts.push(Mount { source, label });
        index
    }

    /// Remove the mount at `index`, shifting later mounts down by one
    ///
    /// Handles already opened through the mount stay usable.
    pub fn unmount(&mut self, index: usize) -> VfsResult<()> {
        if index >= self.mounts.len() {
            return Err(VfsError::InvalidMountIndex {
                index,
                len: self.mounts.len(),
            });
        }
        let mount = self.mounts.remove(index);
        info!("Unmounted {} from index {}", mount.label, index);
        Ok(())
    }

    /// Number of mounts
    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    /// Check if nothing is mounted
    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Mounts in mount order
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Open the file at `path` from the highest-priority mount that has it
    pub fn open_file(&self, path: &str) -> VfsResult<Box<dyn VirtualFile>> {
        self.search(path, |source| source.open_file(path))
            .map(|(_, file)| file)
    }

    /// Open the directory at `path` from the highest-priority mount that has it
    ///
    /// Directories are not merged across mounts; the listing is that of the
    /// serving mount alone.
    pub fn open_directory(&self, path: &str) -> VfsResult<Box<dyn VirtualDirectory>> {
        self.search(path, |source| source.open_directory(path))
            .map(|(_, dir)| dir)
    }

    /// Index of the mount that would serve `path`
    pub fn find_mount(&self, path: &str) -> VfsResult<usize> {
        self.stat(path).map(|stat| stat.mount)
    }

    /// Resolve `path` to its serving mount, kind and size
    ///
    /// Within one mount a file wins over a directory of the same name.
    pub fn stat(&self, path: &str) -> VfsResult<Stat> {
        self.search(path, |source| match source.open_file(path) {
            Ok(file) => Ok((EntryKind::File, file.size())),
            Err(e) if e.is_not_found() => source
                .open_directory(path)
                .map(|dir| (EntryKind::Directory, dir.len() as u64)),
            Err(e) => Err(e),
        })
        .map(|(mount, (kind, size))| Stat { mount, kind, size })
    }

    /// Try `open` on every mount, most recent first
    ///
    /// NotFound moves on to the next mount. Any other error is remembered and
    /// the search continues; if no mount succeeds, the first such error is
    /// returned instead of NotFound.
    fn search<T>(
        &self,
        path: &str,
        open: impl Fn(&dyn VirtualFileSystem) -> VfsResult<T>,
    ) -> VfsResult<(usize, T)> {
        let mut first_error = None;

        for (index, mount) in self.mounts.iter().enumerate().rev() {
            match open(mount.source.as_ref()) {
                Ok(found) => {
                    debug!("{} served by mount {} ({})", path, index, mount.label);
                    return Ok((index, found));
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!("Mount {} ({}) failed on {}: {}", index, mount.label, path, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        Err(first_error.unwrap_or_else(|| VfsError::not_found(path)))
    }
}
