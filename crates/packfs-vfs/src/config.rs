//! Configuration for the virtual filesystem

use crate::{VfsError, VfsResult};
use packfs_formats::pack::PackOpenOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Options applied to every pack mounted through a [`LayeredFileSystem`]
///
/// [`LayeredFileSystem`]: crate::LayeredFileSystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Verify each pack's Adler-32 footer when it is mounted
    pub verify_checksum: bool,

    /// Enable memory-mapped I/O for pack payloads
    pub enable_mmap: bool,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            verify_checksum: false,
            enable_mmap: true,
        }
    }
}

impl VfsConfig {
    /// Enable or disable checksum verification at mount time
    #[must_use]
    pub const fn with_verify_checksum(mut self, enable: bool) -> Self {
        self.verify_checksum = enable;
        self
    }

    /// Enable or disable memory-mapped payload reads
    #[must_use]
    pub const fn with_mmap(mut self, enable: bool) -> Self {
        self.enable_mmap = enable;
        self
    }

    /// Options for opening a pack under this configuration
    pub const fn pack_options(&self) -> PackOpenOptions {
        PackOpenOptions {
            verify_checksum: self.verify_checksum,
            use_mmap: self.enable_mmap,
        }
    }
}

/// One source to mount
///
/// Serialized as `{"kind": "os", "path": ...}` or `{"kind": "pack", "path": ...}`,
/// and parsed from `os:<path>` or `pack:<path>` on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MountSpec {
    /// Directory on the native filesystem
    Os {
        /// Root directory
        path: PathBuf,
    },
    /// Pack archive
    Pack {
        /// Archive file
        path: PathBuf,
    },
}

impl MountSpec {
    /// Path of the mount target
    pub fn path(&self) -> &Path {
        match self {
            Self::Os { path } | Self::Pack { path } => path,
        }
    }
}

impl fmt::Display for MountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Os { path } => write!(f, "os:{}", path.display()),
            Self::Pack { path } => write!(f, "pack:{}", path.display()),
        }
    }
}

impl FromStr for MountSpec {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, path) = s.split_once(':').ok_or_else(|| {
            VfsError::Config(format!("mount spec '{s}' must be os:<path> or pack:<path>"))
        })?;
        if path.is_empty() {
            return Err(VfsError::Config(format!("mount spec '{s}' has no path")));
        }

        let path = PathBuf::from(path);
        match kind {
            "os" => Ok(Self::Os { path }),
            "pack" => Ok(Self::Pack { path }),
            other => Err(VfsError::Config(format!(
                "unknown mount kind '{other}' in '{s}'"
            ))),
        }
    }
}

/// Ordered list of mounts plus the configuration they are mounted with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPlan {
    /// Options for pack mounts
    #[serde(default)]
    pub config: VfsConfig,

    /// Sources in mount order; later entries shadow earlier ones
    #[serde(default)]
    pub mounts: Vec<MountSpec>,
}

impl MountPlan {
    /// Parse a plan from JSON text
    pub fn from_json(text: &str) -> VfsResult<Self> {
        serde_json::from_str(text).map_err(|e| VfsError::Config(format!("invalid mount plan: {e}")))
    }

    /// Load a plan from a JSON file
    pub fn load(path: impl AsRef<Path>) -> VfsResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Serialize the plan as pretty-printed JSON
    pub fn to_json(&self) -> VfsResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| VfsError::Config(format!("cannot serialize mount plan: {e}")))
    }

    /// Append a mount
    #[must_use]
    pub fn with_mount(mut self, spec: MountSpec) -> Self {
        self.mounts.push(spec);
        self
    }
}
