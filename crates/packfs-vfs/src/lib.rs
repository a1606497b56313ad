//! Layered, read-only virtual filesystem over pack archives and host directories.
//!
//! Application code opens files and directories by path through a
//! [`LayeredFileSystem`] without knowing which mounted source holds them:
//!
//! - **Pack sources**: [`PackFileSystem`] navigates an archive built by
//!   `packfs-formats` through its flat record table
//! - **Host sources**: [`HostFileSystem`] passes through to a directory on
//!   the native filesystem
//!
//! Mounts are searched in reverse mount order, so the most recently mounted
//! source shadows older ones.
//!
//! # Example
//!
//! ```rust,no_run
//! use packfs_vfs::{LayeredFileSystem, VfsConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut vfs = LayeredFileSystem::with_config(VfsConfig::default().with_verify_checksum(true));
//! vfs.mount_pack("base.pac")?;
//! vfs.mount_os("overrides/")?;
//!
//! let file = vfs.open_file("textures/grass.png")?;
//! let bytes = file.read_to_vec()?;
//! # let _ = bytes;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

use packfs_formats::pack::PackError;
use std::path::PathBuf;
use thiserror::Error;

// Capability traits
pub mod fs;

// Archive-backed source
pub mod pack_fs;

// Native filesystem source
pub mod host_fs;

// Mount list and override resolution
pub mod layered;

// Configuration and mount plans
pub mod config;

pub use config::{MountPlan, MountSpec, VfsConfig};
pub use fs::{DirEntry, SourceKind, VirtualDirectory, VirtualFile, VirtualFileSystem};
pub use host_fs::HostFileSystem;
pub use layered::{LayeredFileSystem, Mount, Stat};
pub use pack_fs::PackFileSystem;

/// Result type for virtual filesystem operations.
pub type VfsResult<T> = std::result::Result<T, VfsError>;

/// Errors that can occur while mounting or reading through the filesystem.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Path absent, wrong kind, or child index out of range.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Archive failed validation.
    #[error("Invalid archive: {0}")]
    Format(#[source] PackError),

    /// Host I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mount target missing, unreadable or malformed.
    #[error("Cannot mount {}: {source}", .target.display())]
    Mount {
        /// Path that was being mounted
        target: PathBuf,
        /// Underlying failure
        #[source]
        source: Box<VfsError>,
    },

    /// Unmount of a slot that does not exist.
    #[error("Mount index {index} out of range ({len} mounts)")]
    InvalidMountIndex {
        /// Requested index
        index: usize,
        /// Number of mounts
        len: usize,
    },

    /// Malformed mount specification or plan.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl VfsError {
    /// Check if this error only means the path does not exist in a source
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub(crate) fn mount(target: impl Into<PathBuf>, source: Self) -> Self {
        Self::Mount {
            target: target.into(),
            source: Box::new(source),
        }
    }
}

impl From<PackError> for VfsError {
    fn from(error: PackError) -> Self {
        match error {
            PackError::Io(e) => Self::Io(e),
            other => Self::Format(other),
        }
    }
}
