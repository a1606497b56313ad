//! Command-line front end for packfs.
//!
//! The `packfs` binary is a thin wrapper around this library:
//! - `build` scans a directory and writes a pack
//! - `verify` opens a pack and checks its Adler-32 footer
//! - `ls`, `cat` and `stat` resolve paths through a layered mount set
//!
//! Mount sets come from repeated `--mount os:<dir>` / `--mount pack:<file>`
//! flags, a JSON plan given with `--plan`, or both (plan mounts first).

#![warn(missing_docs)]

use clap::{Args, Parser, Subcommand};
use packfs_vfs::MountSpec;
use std::path::PathBuf;

pub mod commands;

pub use commands::run;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(
    name = "packfs",
    about = "Build, verify and browse pack archives and layered mounts",
    version
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Pack a directory (or a single file) into an archive
    Build {
        /// Directory or file to pack
        source: PathBuf,
        /// Archive to write; an existing file is overwritten
        output: PathBuf,
    },

    /// Check an archive's structure and checksum
    Verify {
        /// Archive to check
        pack: PathBuf,
    },

    /// List a directory through the mounted sources
    Ls {
        /// Sources to search
        #[command(flatten)]
        mounts: MountArgs,
        /// Directory to list
        #[arg(default_value = "/")]
        path: String,
    },

    /// Write a file's contents to standard output
    Cat {
        /// Sources to search
        #[command(flatten)]
        mounts: MountArgs,
        /// File to print
        path: String,
    },

    /// Show which mount serves a path, and its kind and size
    Stat {
        /// Sources to search
        #[command(flatten)]
        mounts: MountArgs,
        /// Path to look up
        path: String,
    },
}

/// Mount selection shared by the browsing subcommands
#[derive(Debug, Clone, Default, Args)]
pub struct MountArgs {
    /// Source to mount, `os:<dir>` or `pack:<file>`; later mounts win
    #[arg(short, long = "mount", value_name = "SPEC")]
    pub mounts: Vec<MountSpec>,

    /// JSON mount plan applied before any --mount flags
    #[arg(long, env = "PACKFS_PLAN", value_name = "FILE")]
    pub plan: Option<PathBuf>,

    /// Verify pack checksums while mounting
    #[arg(long)]
    pub verify_checksum: bool,

    /// Read pack payloads through a file handle instead of a memory map
    #[arg(long)]
    pub no_mmap: bool,
}
